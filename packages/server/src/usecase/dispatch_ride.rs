//! UseCase: 配車（Dispatch Coordinator）
//!
//! 配車リクエストごとに 1 つのセッションを持ち、ランク順の候補ドライバーへ
//! 1 人ずつオファーを出して、承諾・拒否・タイムアウトのいずれかを待つ。
//!
//! ```text
//! offering(i) ──accept──▶ matched
//!     │ reject / timeout
//!     ▼
//! offering(i+1) ... ──▶ exhausted
//!     │ cancel（どの時点でも）
//!     ▼
//! cancelled
//! ```
//!
//! ## 並行性
//!
//! - 待機は `oneshot` 受信側への `tokio::time::timeout` で行い、他の接続をブロックしない
//! - 応答スロット（`oneshot::Sender`）はセッションの `parking_lot::Mutex` が所有する。
//!   承諾・拒否・キャンセル・タイムアウトはいずれもスロットを取り出した側だけが勝つため、
//!   承諾とキャンセルが競合しても結果はちょうど 1 つになる
//! - ロックは `.await` をまたいで保持しない
//! - ドライバーはオファーから確定までの間 `driver_claims` で確保される。確保できない
//!   （他の配車がオファー中）か担当中の Ride があるドライバーは飛ばすため、
//!   1 人のドライバーが同時に 2 件の Ride にマッチングすることはない
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DispatchCoordinator::dispatch() / respond() / cancel()
//!
//! ### どのような状況を想定しているか
//! - 正常系：承諾によるマッチング、拒否・タイムアウト後のフォールバック
//! - 異常系：候補検索の失敗、同一リクエストの二重配車、期限切れ後の応答
//! - エッジケース：到達不能なドライバー（FailFast / Skip の両ポリシー）、承諾とキャンセルの競合、
//!   同じドライバーを候補とする配車の並行実行、確定途中のストア障害

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use ridelink_shared::time::Clock;
use tokio::sync::oneshot;

use crate::domain::{
    Candidate, CandidateSupplier, ConnectionRegistry, DriverDirectory, RepositoryError, Ride,
    RideId, RideRequest, RideRequestId, RideStatus, RideStore, ServerEvent, Timestamp, UserId,
};

use super::error::DispatchError;

/// 1 回の配車で参照する候補数の上限
pub const MAX_CANDIDATES: usize = 5;

/// オファー 1 件あたりの待機時間のデフォルト
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(20);

/// 到達不能（未接続）の候補に当たったときの振る舞い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreachablePolicy {
    /// 配車全体を即座に打ち切る
    #[default]
    FailFast,
    /// 次の候補に進む
    Skip,
}

/// 配車の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub offer_timeout: Duration,
    pub max_candidates: usize,
    pub unreachable_policy: UnreachablePolicy,
}

impl DispatchConfig {
    pub fn new(
        offer_timeout: Duration,
        max_candidates: usize,
        unreachable_policy: UnreachablePolicy,
    ) -> Self {
        Self {
            offer_timeout,
            max_candidates: max_candidates.clamp(1, MAX_CANDIDATES),
            unreachable_policy,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_OFFER_TIMEOUT,
            MAX_CANDIDATES,
            UnreachablePolicy::default(),
        )
    }
}

/// 配車の結果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Matched(Ride),
    /// 引き受けるドライバーがいなかった
    Exhausted,
    Cancelled,
}

/// キャンセルの結果
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// 配車中のセッションを打ち切った
    DispatchCancelled,
    /// マッチング済みの Ride をキャンセルした
    RideCancelled(Ride),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfferReply {
    Accept,
    Reject,
    Cancel,
}

struct PendingOffer {
    candidate: UserId,
    reply: oneshot::Sender<OfferReply>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Offering,
    Matched,
    Cancelled,
}

struct SessionState {
    phase: SessionPhase,
    pending: Option<PendingOffer>,
}

/// 配車中の 1 リクエストの状態
struct DispatchSession {
    state: Mutex<SessionState>,
}

impl DispatchSession {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                phase: SessionPhase::Offering,
                pending: None,
            }),
        }
    }

    /// 応答スロットを設置する。既にキャンセル済みなら `false`
    fn open_offer(&self, candidate: UserId, reply: oneshot::Sender<OfferReply>) -> bool {
        let mut state = self.state.lock();
        if state.phase != SessionPhase::Offering {
            return false;
        }
        state.pending = Some(PendingOffer { candidate, reply });
        true
    }

    /// 応答スロットを取り外す。取り外せた（誰も応答していない）場合は `true`
    fn close_offer(&self) -> bool {
        self.state.lock().pending.take().is_some()
    }

    /// 現在のオファー相手からの応答を届ける
    fn reply(&self, responder: &UserId, accepted: bool) -> bool {
        let mut state = self.state.lock();
        let is_current = matches!(&state.pending, Some(pending) if &pending.candidate == responder);
        if !is_current {
            return false;
        }
        let Some(pending) = state.pending.take() else {
            return false;
        };
        let reply = if accepted {
            state.phase = SessionPhase::Matched;
            OfferReply::Accept
        } else {
            OfferReply::Reject
        };
        // タイムアウト処理と競合した場合は offer() 側の try_recv で回収される
        let _ = pending.reply.send(reply);
        true
    }

    fn cancel(&self) -> Result<(), SessionPhase> {
        let mut state = self.state.lock();
        match state.phase {
            SessionPhase::Offering => {
                state.phase = SessionPhase::Cancelled;
                if let Some(pending) = state.pending.take() {
                    let _ = pending.reply.send(OfferReply::Cancel);
                }
                Ok(())
            }
            phase => Err(phase),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().phase == SessionPhase::Cancelled
    }
}

/// セッション表からの削除を保証する
struct SessionGuard<'a> {
    sessions: &'a DashMap<RideRequestId, Arc<DispatchSession>>,
    request_id: RideRequestId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.sessions.remove(&self.request_id);
    }
}

/// オファー中のドライバーの確保。drop で解放する
/// ミリ秒に変換する。`u64` に収まらない場合は `u64::MAX`
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

struct DriverClaim<'a> {
    claims: &'a DashMap<UserId, RideRequestId>,
    driver: UserId,
    request_id: RideRequestId,
}

impl Drop for DriverClaim<'_> {
    fn drop(&mut self) {
        self.claims
            .remove_if(&self.driver, |_, holder| holder == &self.request_id);
    }
}

/// 配車のユースケース
pub struct DispatchCoordinator {
    registry: Arc<dyn ConnectionRegistry>,
    supplier: Arc<dyn CandidateSupplier>,
    rides: Arc<dyn RideStore>,
    drivers: Arc<dyn DriverDirectory>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    /// Key: 配車リクエスト ID, Value: 配車中のセッション
    sessions: DashMap<RideRequestId, Arc<DispatchSession>>,
    /// Key: オファー中または確定処理中のドライバー, Value: 確保している配車リクエスト ID
    driver_claims: DashMap<UserId, RideRequestId>,
}

impl DispatchCoordinator {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        supplier: Arc<dyn CandidateSupplier>,
        rides: Arc<dyn RideStore>,
        drivers: Arc<dyn DriverDirectory>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            supplier,
            rides,
            drivers,
            clock,
            config,
            sessions: DashMap::new(),
            driver_claims: DashMap::new(),
        }
    }

    /// 配車を実行し、マッチング・枯渇・キャンセルのいずれかで終わるまで待つ
    pub async fn dispatch(&self, request: RideRequest) -> Result<DispatchOutcome, DispatchError> {
        let session = Arc::new(DispatchSession::new());
        match self.sessions.entry(request.id.clone()) {
            Entry::Occupied(_) => {
                return Err(DispatchError::AlreadyDispatching(request.id.to_string()));
            }
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
            }
        }
        let _guard = SessionGuard {
            sessions: &self.sessions,
            request_id: request.id.clone(),
        };

        // セッション登録後に確認する。先行する配車は Ride を保存してからセッションを外すため、
        // ここで見えない Ride が後から確定することはない
        if self.rides.find_ride_by_request(&request.id).await?.is_some() {
            return Err(DispatchError::AlreadyMatched(request.id.to_string()));
        }

        tracing::info!(
            request_id = %request.id,
            requester = %request.requester,
            ride_class = ?request.ride_class,
            "dispatch started"
        );

        let mut candidates = self.supplier.rank_candidates(&request).await?;
        candidates.truncate(self.config.max_candidates);

        for candidate in &candidates {
            if session.is_cancelled() {
                return Ok(DispatchOutcome::Cancelled);
            }

            // 確定までドライバーを確保したままにする
            let Some(_claim) = self.claim_driver(&candidate.driver, &request.id).await? else {
                tracing::debug!(
                    request_id = %request.id,
                    driver = %candidate.driver,
                    "candidate busy with another ride, skipping"
                );
                continue;
            };

            let reply = match self.offer(&session, &request, candidate).await {
                Some(reply) => reply,
                None => match self.config.unreachable_policy {
                    UnreachablePolicy::FailFast => {
                        tracing::info!(
                            request_id = %request.id,
                            driver = %candidate.driver,
                            "candidate unreachable, aborting dispatch"
                        );
                        return Ok(DispatchOutcome::Exhausted);
                    }
                    UnreachablePolicy::Skip => {
                        tracing::debug!(
                            request_id = %request.id,
                            driver = %candidate.driver,
                            "candidate unreachable, skipping"
                        );
                        continue;
                    }
                },
            };

            match reply {
                OfferReply::Accept => {
                    let ride = self.commit(&request, &candidate.driver).await?;
                    return Ok(DispatchOutcome::Matched(ride));
                }
                OfferReply::Reject => continue,
                OfferReply::Cancel => {
                    tracing::info!(request_id = %request.id, "dispatch cancelled");
                    return Ok(DispatchOutcome::Cancelled);
                }
            }
        }

        if session.is_cancelled() {
            return Ok(DispatchOutcome::Cancelled);
        }
        tracing::info!(request_id = %request.id, "no riders available");
        Ok(DispatchOutcome::Exhausted)
    }

    /// ドライバーを確保する
    ///
    /// 他の配車がオファー中、または担当中の Ride がある場合は `None`。
    async fn claim_driver(
        &self,
        driver: &UserId,
        request_id: &RideRequestId,
    ) -> Result<Option<DriverClaim<'_>>, DispatchError> {
        match self.driver_claims.entry(driver.clone()) {
            Entry::Occupied(_) => return Ok(None),
            Entry::Vacant(entry) => {
                entry.insert(request_id.clone());
            }
        }
        let claim = DriverClaim {
            claims: &self.driver_claims,
            driver: driver.clone(),
            request_id: request_id.clone(),
        };

        // 確定処理は確保を保持したまま担当 Ride を設定するため、確保後に見れば取りこぼさない
        if self.rides.current_ride_for(driver).await?.is_some() {
            return Ok(None);
        }
        Ok(Some(claim))
    }

    /// 1 人の候補にオファーを出して応答を待つ
    ///
    /// 到達不能なら `None`。タイムアウトは拒否として扱う。
    async fn offer(
        &self,
        session: &DispatchSession,
        request: &RideRequest,
        candidate: &Candidate,
    ) -> Option<OfferReply> {
        let channel = self.registry.lookup(&candidate.driver)?;

        let expires_in_ms = saturating_millis(self.config.offer_timeout);
        let event = ServerEvent::RideOffer {
            request_id: request.id.clone(),
            requester_id: request.requester.clone(),
            pickup: request.pickup,
            ride_class: request.ride_class,
            distance_m: candidate.distance_m,
            fare_estimate: request.fare_estimate(),
            expires_in_ms,
        };
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode ride offer");
                return None;
            }
        };

        let (tx, mut rx) = oneshot::channel();
        if !session.open_offer(candidate.driver.clone(), tx) {
            return Some(OfferReply::Cancel);
        }
        if channel.send(frame).is_err() {
            // lookup と送信の間に切断された
            session.close_offer();
            return None;
        }
        tracing::debug!(
            request_id = %request.id,
            driver = %candidate.driver,
            "ride offer sent"
        );

        match tokio::time::timeout(self.config.offer_timeout, &mut rx).await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(_)) => Some(OfferReply::Reject),
            Err(_) => {
                if !session.close_offer() {
                    // タイムアウトと同時に応答が届いていた
                    return Some(rx.try_recv().unwrap_or(OfferReply::Reject));
                }
                tracing::debug!(
                    request_id = %request.id,
                    driver = %candidate.driver,
                    "ride offer expired"
                );
                let expired = ServerEvent::RideOfferExpired {
                    request_id: request.id.clone(),
                };
                if let Err(e) = self.registry.push_event(&candidate.driver, &expired) {
                    tracing::debug!(driver = %candidate.driver, error = %e, "expiry not delivered");
                }
                Some(OfferReply::Reject)
            }
        }
    }

    /// 承諾を確定し、Ride を作成して双方に通知する
    ///
    /// Ride の保存後に失敗した場合は Ride をキャンセル扱いに戻し、ドライバーに
    /// `ride:cancelled` を送ってからエラーを返す。
    async fn commit(&self, request: &RideRequest, driver: &UserId) -> Result<Ride, DispatchError> {
        let ride = Ride::from_request(
            RideId::generate(),
            request,
            driver.clone(),
            Timestamp::new(self.clock.now_millis()),
        );
        self.rides.insert_ride(&ride).await.map_err(|e| match e {
            RepositoryError::DuplicateRide(_) => {
                DispatchError::AlreadyMatched(request.id.to_string())
            }
            other => DispatchError::Repository(other),
        })?;
        if let Err(e) = self.occupy_driver(&ride).await {
            tracing::error!(
                request_id = %request.id,
                ride_id = %ride.id,
                error = %e,
                "failed to commit ride, rolling back"
            );
            self.roll_back(ride).await;
            return Err(e.into());
        }

        tracing::info!(
            request_id = %request.id,
            ride_id = %ride.id,
            driver = %driver,
            "ride matched"
        );

        let matched = ServerEvent::RideMatched { ride: ride.clone() };
        for user in [driver, &request.requester] {
            if let Err(e) = self.registry.push_event(user, &matched) {
                tracing::warn!(user_id = %user, error = %e, "ride:matched not delivered");
            }
        }
        Ok(ride)
    }

    async fn occupy_driver(&self, ride: &Ride) -> Result<(), RepositoryError> {
        self.rides
            .assign_current_ride(&ride.driver, Some(ride.id.clone()))
            .await?;
        self.drivers.set_available(&ride.driver, false).await
    }

    /// 確定に失敗した Ride を取り消す（失敗はログのみ）
    async fn roll_back(&self, mut ride: Ride) {
        if ride.transition_to(RideStatus::Cancelled).is_ok() {
            if let Err(e) = self.rides.save_ride(&ride).await {
                tracing::error!(ride_id = %ride.id, error = %e, "failed to cancel uncommitted ride");
            }
        }
        if let Err(e) = self.rides.assign_current_ride(&ride.driver, None).await {
            tracing::error!(driver = %ride.driver, error = %e, "failed to clear current ride");
        }

        let cancelled = ServerEvent::RideCancelled {
            ride_id: ride.id.clone(),
            request_id: ride.request_id.clone(),
        };
        if let Err(e) = self.registry.push_event(&ride.driver, &cancelled) {
            tracing::warn!(driver = %ride.driver, error = %e, "ride:cancelled not delivered");
        }
    }

    /// 候補ドライバーの応答を届ける
    ///
    /// 現在オファー中の候補のみが応答できる。それ以外（期限切れ・他人宛て・
    /// 配車終了後）は `NoPendingOffer`。
    pub fn respond(
        &self,
        request_id: &RideRequestId,
        responder: &UserId,
        accepted: bool,
    ) -> Result<(), DispatchError> {
        let session = self
            .sessions
            .get(request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::NoPendingOffer(request_id.to_string()))?;

        if !session.reply(responder, accepted) {
            return Err(DispatchError::NoPendingOffer(request_id.to_string()));
        }
        tracing::debug!(
            request_id = %request_id,
            driver = %responder,
            accepted,
            "offer answered"
        );
        Ok(())
    }

    /// 配車または確定済み Ride をキャンセルする
    pub async fn cancel(&self, request_id: &RideRequestId) -> Result<CancelOutcome, DispatchError> {
        let session = self
            .sessions
            .get(request_id)
            .map(|entry| entry.value().clone());

        if let Some(session) = session {
            return match session.cancel() {
                Ok(()) => {
                    tracing::info!(request_id = %request_id, "dispatch cancel requested");
                    Ok(CancelOutcome::DispatchCancelled)
                }
                Err(SessionPhase::Matched) => {
                    Err(DispatchError::AlreadyMatched(request_id.to_string()))
                }
                Err(_) => Ok(CancelOutcome::DispatchCancelled),
            };
        }

        let mut ride = self
            .rides
            .find_ride_by_request(request_id)
            .await?
            .ok_or_else(|| DispatchError::RequestNotFound(request_id.to_string()))?;
        ride.transition_to(RideStatus::Cancelled)?;
        self.rides.save_ride(&ride).await?;
        self.rides.assign_current_ride(&ride.driver, None).await?;
        self.drivers.set_available(&ride.driver, true).await?;

        tracing::info!(request_id = %request_id, ride_id = %ride.id, "ride cancelled");

        let cancelled = ServerEvent::RideCancelled {
            ride_id: ride.id.clone(),
            request_id: request_id.clone(),
        };
        if let Err(e) = self.registry.push_event(&ride.driver, &cancelled) {
            tracing::warn!(driver = %ride.driver, error = %e, "ride:cancelled not delivered");
        }
        Ok(CancelOutcome::RideCancelled(ride))
    }

    /// 配車中のセッション数
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
