//! 外部コラボレーターの trait 定義
//!
//! 永続化・候補ドライバー検索・位置情報ストア・認証はコアの外側にある。
//! ドメイン層が必要とするインターフェースをドメイン層自身が定義し、
//! 具体的な実装は Infrastructure 層が提供する（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{
        Candidate, ChatMessage, ChatRoom, Credentials, DriverProfile, LocationSample, Principal,
        Ride, RideRequest,
    },
    error::{AuthError, CandidateQueryError, RepositoryError},
    value_object::{ChatRoomId, RideId, RideRequestId, Timestamp, UserId},
};

/// Ride の永続化
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Ride を保存する。同じリクエストの Ride が既にあれば `DuplicateRide`
    async fn insert_ride(&self, ride: &Ride) -> Result<(), RepositoryError>;

    /// 既存の Ride を上書き保存する
    async fn save_ride(&self, ride: &Ride) -> Result<(), RepositoryError>;

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>, RepositoryError>;

    async fn find_ride_by_request(
        &self,
        request_id: &RideRequestId,
    ) -> Result<Option<Ride>, RepositoryError>;

    /// ドライバーが現在担当している Ride
    async fn current_ride_for(&self, driver: &UserId) -> Result<Option<RideId>, RepositoryError>;

    /// ドライバーの担当 Ride を設定（`None` で解除）
    async fn assign_current_ride(
        &self,
        driver: &UserId,
        ride_id: Option<RideId>,
    ) -> Result<(), RepositoryError>;
}

/// ドライバーのプロフィール（ユーザーストアの代替）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn upsert(&self, profile: DriverProfile) -> Result<(), RepositoryError>;

    async fn get(&self, driver: &UserId) -> Result<Option<DriverProfile>, RepositoryError>;

    async fn list(&self) -> Result<Vec<DriverProfile>, RepositoryError>;

    /// 空車フラグを更新する。未登録のドライバーは無視する
    async fn set_available(&self, driver: &UserId, available: bool)
    -> Result<(), RepositoryError>;
}

/// 配車候補の検索（geospatial query）
///
/// 近さ・適格性でランク付けされた候補を返す。コアはインデックスを実装しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateSupplier: Send + Sync {
    async fn rank_candidates(
        &self,
        request: &RideRequest,
    ) -> Result<Vec<Candidate>, CandidateQueryError>;
}

/// ドライバー位置情報の保存先
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// 最新サンプルとして保存する（ドライバーごとに最新の 1 件のみ保持）
    async fn save_sample(&self, sample: LocationSample) -> Result<(), RepositoryError>;

    async fn latest(&self, driver: &UserId) -> Result<Option<LocationSample>, RepositoryError>;

    /// 全ドライバーの最新サンプル
    async fn all_latest(&self) -> Result<Vec<LocationSample>, RepositoryError>;
}

/// チャットルームの永続化
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// `(ride, {a, b})` のルームを探し、なければ作成する（不可分操作）
    ///
    /// 作成した場合は `true` を併せて返す。
    async fn find_or_create(
        &self,
        ride_id: &RideId,
        requester: &UserId,
        target: &UserId,
        created_at: Timestamp,
    ) -> Result<(ChatRoom, bool), RepositoryError>;

    async fn get(&self, chat_room_id: &ChatRoomId) -> Result<Option<ChatRoom>, RepositoryError>;

    /// メッセージを追記する。ルームが存在しなければ `ChatRoomNotFound`
    async fn append_message(
        &self,
        chat_room_id: &ChatRoomId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError>;
}

/// 新しい接続を検証済みの主体に解決する
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError>;
}
