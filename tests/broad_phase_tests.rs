use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sweep2d::collision::{BroadPhase, PairCallback};
use sweep2d::math::{Aabb, Segment, Vector2};

/// Records the pair set exactly as the broad phase reports it
#[derive(Default)]
struct PairRecorder {
    pairs: HashSet<(u32, u32)>,
    added: usize,
    removed: usize,
}

fn key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

impl PairCallback<u32, ()> for PairRecorder {
    fn pair_added(&mut self, a: u32, b: u32) -> Option<()> {
        assert!(self.pairs.insert(key(a, b)), "pair ({}, {}) reported twice", a, b);
        self.added += 1;
        Some(())
    }

    fn pair_removed(&mut self, a: u32, b: u32, _pair_data: Option<()>) {
        assert!(self.pairs.remove(&key(a, b)), "pair ({}, {}) removed but never added", a, b);
        self.removed += 1;
    }
}

fn world_bounds() -> Aabb {
    Aabb::new(Vector2::new(-100.0, -100.0), Vector2::new(100.0, 100.0))
}

fn random_aabb(rng: &mut StdRng) -> Aabb {
    let center = Vector2::new(rng.gen_range(-90.0..90.0), rng.gen_range(-90.0..90.0));
    let half = Vector2::new(rng.gen_range(0.5..10.0), rng.gen_range(0.5..10.0));
    Aabb::from_center_half_extents(center, half)
}

/// Checks the reported pairs against an O(n^2) overlap test on the quantized bounds
fn check_against_brute_force(bp: &BroadPhase<u32, ()>, live: &[(u16, u32)], recorder: &PairRecorder) {
    let mut expected = HashSet::new();
    for (i, &(id1, data1)) in live.iter().enumerate() {
        for &(id2, data2) in &live[i + 1..] {
            let b1 = bp.get_bound_values(id1).unwrap();
            let b2 = bp.get_bound_values(id2).unwrap();
            if b1.overlaps(&b2) {
                expected.insert(key(data1, data2));
            }
        }
    }

    assert_eq!(recorder.pairs, expected);
    assert_eq!(bp.pair_count(), expected.len());
}

#[test]
fn test_random_operations_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut bp: BroadPhase<u32, ()> = BroadPhase::new(world_bounds(), 64, 1024).unwrap();
    let mut recorder = PairRecorder::default();
    let mut live: Vec<(u16, u32)> = Vec::new();
    let mut next_data = 0u32;

    for round in 0..600 {
        match rng.gen_range(0..4) {
            0 | 1 if live.len() < 48 => {
                let aabb = random_aabb(&mut rng);
                let id = bp.create_proxy(&aabb, next_data, &mut recorder).unwrap();
                live.push((id, next_data));
                next_data += 1;
            }
            2 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let aabb = random_aabb(&mut rng);
                bp.move_proxy(live[index].0, &aabb);
            }
            3 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let (id, _) = live.swap_remove(index);
                bp.destroy_proxy(id, &mut recorder).unwrap();
            }
            _ => {}
        }

        if round % 7 == 0 {
            bp.commit(&mut recorder);
            bp.validate().unwrap();
            check_against_brute_force(&bp, &live, &recorder);
        }
    }

    bp.commit(&mut recorder);
    check_against_brute_force(&bp, &live, &recorder);
    assert!(recorder.added > 0);
    assert!(recorder.removed > 0);
}

#[test]
fn test_small_moves_keep_pairs_consistent() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut bp: BroadPhase<u32, ()> = BroadPhase::new(world_bounds(), 32, 512).unwrap();
    let mut recorder = PairRecorder::default();

    // A crowded cluster moving in small increments exercises the bound swaps.
    let mut boxes: Vec<(u16, u32, Vector2)> = (0..20)
        .map(|i| {
            let center = Vector2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
            let aabb = Aabb::from_center_half_extents(center, Vector2::new(1.0, 1.0));
            (bp.create_proxy(&aabb, i, &mut recorder).unwrap(), i, center)
        })
        .collect();

    for _ in 0..200 {
        for (id, _, center) in boxes.iter_mut() {
            *center += Vector2::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3));
            bp.move_proxy(*id, &Aabb::from_center_half_extents(*center, Vector2::new(1.0, 1.0)));
        }
        bp.commit(&mut recorder);

        let live: Vec<(u16, u32)> = boxes.iter().map(|&(id, data, _)| (id, data)).collect();
        check_against_brute_force(&bp, &live, &recorder);
    }

    bp.validate().unwrap();
}

#[test]
fn test_capacity_is_a_hard_limit() {
    let mut bp: BroadPhase<u32, ()> = BroadPhase::new(world_bounds(), 4, 64).unwrap();
    let mut recorder = PairRecorder::default();

    let aabb = Aabb::from_center_half_extents(Vector2::zero(), Vector2::new(1.0, 1.0));
    for i in 0..4 {
        assert!(bp.create_proxy(&aabb, i, &mut recorder).is_some());
    }
    assert!(bp.create_proxy(&aabb, 4, &mut recorder).is_none());
    assert_eq!(bp.proxy_count(), 4);
    assert_eq!(recorder.pairs.len(), 6);
}

#[test]
fn test_queries() {
    let mut bp: BroadPhase<u32, ()> = BroadPhase::new(world_bounds(), 16, 64).unwrap();
    let mut recorder = PairRecorder::default();

    for i in 0..5 {
        let center = Vector2::new(i as f32 * 10.0, 0.0);
        let aabb = Aabb::from_center_half_extents(center, Vector2::new(1.0, 1.0));
        bp.create_proxy(&aabb, i, &mut recorder).unwrap();
    }

    let region = Aabb::new(Vector2::new(5.0, -1.0), Vector2::new(25.0, 1.0));
    let mut found = bp.query_aabb(&region, 16);
    found.sort();
    assert_eq!(found, vec![1, 2]);

    let ray = Segment::new(Vector2::new(45.0, 0.0), Vector2::new(-5.0, 0.0));
    let hits = bp.query_segment(&ray, 3, true);
    let order: Vec<u32> = hits.iter().map(|&(data, _)| data).collect();
    assert_eq!(order, vec![4, 3, 2]);
    assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
}
