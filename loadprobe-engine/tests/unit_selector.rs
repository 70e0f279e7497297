use loadprobe_common::{Endpoint, HttpMethod};
use loadprobe_engine::selector::EndpointSelector;
use rand::{rngs::StdRng, SeedableRng};

fn endpoints(weights: &[u32]) -> Vec<Endpoint> {
    weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Endpoint::new(HttpMethod::Get, format!("/e{i}")).with_weight(w))
        .collect()
}

#[test]
fn test_roll_boundaries() {
    // cumulative [1, 4]: rolls up to 1.0 pick /e0, anything above picks /e1
    let selector = EndpointSelector::new(endpoints(&[1, 3]));
    assert_eq!(selector.total_weight(), 4);
    assert_eq!(selector.endpoint_for_roll(0.0).path, "/e0");
    assert_eq!(selector.endpoint_for_roll(1.0).path, "/e0");
    assert_eq!(selector.endpoint_for_roll(1.0001).path, "/e1");
    assert_eq!(selector.endpoint_for_roll(3.9999).path, "/e1");
}

#[test]
fn test_out_of_range_roll_picks_last() {
    let selector = EndpointSelector::new(endpoints(&[2, 2]));
    assert_eq!(selector.endpoint_for_roll(99.0).path, "/e1");
}

#[test]
fn test_weighted_frequency_within_tolerance() {
    let selector = EndpointSelector::new(endpoints(&[1, 3]));
    let mut rng = StdRng::seed_from_u64(7);

    let draws = 10_000;
    let second = (0..draws)
        .filter(|_| selector.select(&mut rng).path == "/e1")
        .count();
    let freq = second as f64 / draws as f64;

    assert!((0.70..=0.80).contains(&freq), "endpoint 2 frequency {freq} outside 75% ± 5%");
}

#[test]
fn test_same_seed_same_sequence() {
    let selector = EndpointSelector::new(endpoints(&[1, 1, 1]));
    let mut a = StdRng::seed_from_u64(42);
    let mut b = StdRng::seed_from_u64(42);

    let first: Vec<String> = (0..50).map(|_| selector.select(&mut a).path.clone()).collect();
    let second: Vec<String> = (0..50).map(|_| selector.select(&mut b).path.clone()).collect();
    assert_eq!(first, second);
}

#[test]
fn test_single_endpoint_always_selected() {
    let selector = EndpointSelector::new(endpoints(&[5]));
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        assert_eq!(selector.select(&mut rng).path, "/e0");
    }
}

#[test]
fn test_empty_list_falls_back_to_root() {
    let selector = EndpointSelector::new(Vec::new());
    assert_eq!(selector.endpoints(), &[Endpoint::new(HttpMethod::Get, "/")]);
    assert_eq!(selector.total_weight(), 1);
}
