//! Cleanup system: removes hulls destroyed and torpedoes that reached a
//! terminal state during the previous tick, and fuelers past their time.

use subbrawl_core::components::{Fueler, Submarine, Torpedo};
use subbrawl_core::config::FuelerConfig;
use subbrawl_core::types::EntityId;

use crate::store::EntityStore;

/// Collect dead entities into `despawn_buffer` and remove them.
///
/// The buffer is cleared first and keeps the removed ids, sorted, for the
/// caller to report.
pub fn run(store: &mut EntityStore, fuelers: &FuelerConfig, despawn_buffer: &mut Vec<EntityId>) {
    despawn_buffer.clear();

    let world = store.world();
    despawn_buffer.extend(
        world
            .query::<(&EntityId, &Submarine)>()
            .iter()
            .filter(|(_, (_, sub))| sub.destroyed)
            .map(|(_, (id, _))| *id),
    );
    despawn_buffer.extend(
        world
            .query::<(&EntityId, &Torpedo)>()
            .iter()
            .filter(|(_, (_, torp))| torp.guidance.is_terminal())
            .map(|(_, (id, _))| *id),
    );
    despawn_buffer.extend(
        world
            .query::<(&EntityId, &Fueler)>()
            .iter()
            .filter(|(_, (_, f))| {
                f.age_secs > fuelers.lifetime_s
                    || f.used_secs.is_some_and(|used| used > fuelers.used_linger_s)
            })
            .map(|(_, (id, _))| *id),
    );
    despawn_buffer.sort();

    for id in despawn_buffer.iter() {
        store.despawn(*id);
    }
}
