use loadprobe_common::{Endpoint, HttpMethod};
use rand::Rng;

/// Weighted random choice over a fixed endpoint list.
///
/// Each endpoint is picked with probability `weight / total_weight`. Given
/// endpoints `[a: 1, b: 3]` the cumulative table is `[1, 4]`; a roll in
/// `[0, 1]` picks `a`, a roll in `(1, 4)` picks `b`.
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    endpoints: Vec<Endpoint>,
    cumulative: Vec<u64>,
    total_weight: u64,
}

impl EndpointSelector {
    /// An empty list selects the implicit `GET /`.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let endpoints = if endpoints.is_empty() {
            vec![Endpoint::new(HttpMethod::Get, "/")]
        } else {
            endpoints
        };

        let mut running = 0u64;
        let cumulative = endpoints
            .iter()
            .map(|e| {
                running += u64::from(e.weight);
                running
            })
            .collect();

        Self { endpoints, cumulative, total_weight: running }
    }

    /// Draw one endpoint using `rng`.
    pub fn select(&self, rng: &mut impl Rng) -> &Endpoint {
        let roll = rng.gen::<f64>() * self.total_weight as f64;
        self.endpoint_for_roll(roll)
    }

    /// Map a roll in `[0, total_weight)` to the first endpoint whose cumulative
    /// weight reaches it. Exposed for deterministic testing.
    pub fn endpoint_for_roll(&self, roll: f64) -> &Endpoint {
        let idx = self
            .cumulative
            .iter()
            .position(|&c| c as f64 >= roll)
            .unwrap_or(self.endpoints.len() - 1);
        &self.endpoints[idx]
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}
