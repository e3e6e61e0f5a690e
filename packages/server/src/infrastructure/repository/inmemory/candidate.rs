//! InMemory CandidateSupplier 実装
//!
//! DriverDirectory と LocationStore を突き合わせ、適格なドライバーを
//! 乗車地点からの距離順に並べる。geospatial インデックスの代替であり、
//! 全件走査のため小規模環境向け。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Candidate, CandidateQueryError, CandidateSupplier, DriverDirectory, LocationStore, RideRequest,
};

/// 候補とみなす最大距離（メートル）のデフォルト
pub const DEFAULT_MAX_DISTANCE_M: f64 = 20_000.0;

/// インメモリ CandidateSupplier
pub struct InMemoryCandidateSupplier {
    drivers: Arc<dyn DriverDirectory>,
    locations: Arc<dyn LocationStore>,
    max_distance_m: f64,
}

impl InMemoryCandidateSupplier {
    pub fn new(drivers: Arc<dyn DriverDirectory>, locations: Arc<dyn LocationStore>) -> Self {
        Self::with_max_distance(drivers, locations, DEFAULT_MAX_DISTANCE_M)
    }

    pub fn with_max_distance(
        drivers: Arc<dyn DriverDirectory>,
        locations: Arc<dyn LocationStore>,
        max_distance_m: f64,
    ) -> Self {
        Self {
            drivers,
            locations,
            max_distance_m,
        }
    }
}

#[async_trait]
impl CandidateSupplier for InMemoryCandidateSupplier {
    async fn rank_candidates(
        &self,
        request: &RideRequest,
    ) -> Result<Vec<Candidate>, CandidateQueryError> {
        let profiles = self
            .drivers
            .list()
            .await
            .map_err(|e| CandidateQueryError(e.to_string()))?;
        let samples = self
            .locations
            .all_latest()
            .await
            .map_err(|e| CandidateQueryError(e.to_string()))?;

        let mut candidates: Vec<Candidate> = samples
            .into_iter()
            .filter(|sample| sample.driver != request.requester)
            .filter_map(|sample| {
                let profile = profiles.iter().find(|p| p.driver == sample.driver)?;
                if !profile.is_eligible_for(request.ride_class) {
                    return None;
                }
                let distance_m = request.pickup.distance_to(&sample.coordinate);
                (distance_m <= self.max_distance_m).then(|| Candidate {
                    driver: sample.driver,
                    vehicle_rating: profile.vehicle_rating,
                    distance_m,
                })
            })
            .collect();

        // 近い順。同距離ならレーティングの高い順、最後に ID で安定化
        candidates.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| b.vehicle_rating.total_cmp(&a.vehicle_rating))
                .then_with(|| a.driver.cmp(&b.driver))
        });

        tracing::debug!(
            request_id = %request.id,
            candidates = candidates.len(),
            "ranked candidates"
        );
        Ok(candidates)
    }
}
