//! Proptest strategies for snapshots and units.

use proptest::prelude::*;
use tactics_core::math::GridPos;
use tactics_core::snapshot::{Effect, EntityId, Side, StatusEffect, UnitKind, UnitRecord};

/// Hostile kinds that take part in clustering.
const HOSTILE_KINDS: [UnitKind; 6] = [
    UnitKind::Tank,
    UnitKind::Caster,
    UnitKind::Berserker,
    UnitKind::Scout,
    UnitKind::Monster,
    UnitKind::Site,
];

/// A cell inside a `size` x `size` square.
pub fn arb_pos(size: i32) -> impl Strategy<Value = GridPos> {
    (0..size, 0..size).prop_map(|(x, y)| GridPos::new(x, y))
}

/// One of the clustered hostile kinds.
pub fn arb_hostile_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(HOSTILE_KINDS.to_vec())
}

/// Up to `max` hostiles with distinct ids, packed into a `spread` square so
/// that clusters actually form. Some are dead or reviving.
pub fn arb_hostiles(max: usize, spread: i32) -> impl Strategy<Value = Vec<UnitRecord>> {
    prop::collection::vec(
        (arb_hostile_kind(), arb_pos(spread), 0..3u8),
        0..=max,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (kind, position, state))| {
                let id = 100 + EntityId::try_from(i).unwrap_or(0);
                let side = match kind {
                    UnitKind::Monster | UnitKind::Site => None,
                    _ => Some(Side::Second),
                };
                let mut unit = UnitRecord {
                    id,
                    side,
                    kind,
                    position,
                    hp: if state == 0 { 0 } else { 50 },
                    max_hp: 50,
                    attack: 10,
                    defense: 5,
                    vision: 64,
                    range: 9,
                    ..UnitRecord::default()
                };
                if state == 1 && kind != UnitKind::Site {
                    unit.effects.push(StatusEffect {
                        effect: Effect::Reviving,
                        remaining: 3,
                    });
                }
                unit
            })
            .collect()
    })
}

/// A hostile hero with arbitrary combat stats and effects.
pub fn arb_combatant() -> impl Strategy<Value = UnitRecord> {
    (
        prop::sample::select(UnitKind::HEROES.to_vec()),
        1..2000i32,
        0..200i32,
        0..300i32,
        0..100i32,
        any::<[bool; 4]>(),
    )
        .prop_map(|(kind, max_hp, mp, attack, defense, flags)| {
            let effects = [
                Effect::Stunned,
                Effect::AwaitingRevive,
                Effect::Undying,
                Effect::Mining,
            ]
            .into_iter()
            .zip(flags)
            .filter(|(_, on)| *on)
            .map(|(effect, _)| StatusEffect {
                effect,
                remaining: 2,
            })
            .collect();
            UnitRecord {
                id: 500,
                side: Some(Side::Second),
                kind,
                position: GridPos::new(40, 40),
                hp: max_hp,
                max_hp,
                mp,
                max_mp: mp,
                attack,
                defense,
                vision: 64,
                range: 9,
                effects,
                ..UnitRecord::default()
            }
        })
}
