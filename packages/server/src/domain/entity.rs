//! Entity 定義
//!
//! 配車リクエスト・確定済み Ride・チャットルームなど、識別子によって同一性を持つドメインモデル。
//! 関連は ID（外部キー）で表現し、オブジェクトグラフは持たない。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    error::{RideStatusError, ValueObjectError},
    value_object::{
        ChatRoomId, Coordinate, MessageBody, RideClass, RideId, RideRequestId, Timestamp, UserId,
    },
};

/// 配車リクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: RideRequestId,
    pub requester: UserId,
    pub pickup: Coordinate,
    pub ride_class: RideClass,
    pub requested_at: Timestamp,
    /// 降車地点（運賃の見積もりにのみ使う）
    #[serde(default)]
    pub destination: Option<Coordinate>,
}

impl RideRequest {
    pub fn new(
        id: RideRequestId,
        requester: UserId,
        pickup: Coordinate,
        ride_class: RideClass,
        requested_at: Timestamp,
    ) -> Self {
        Self {
            id,
            requester,
            pickup,
            ride_class,
            requested_at,
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: Coordinate) -> Self {
        self.destination = Some(destination);
        self
    }

    /// 乗車地点から降車地点までの直線距離による運賃の見積もり
    ///
    /// 降車地点がない場合は `None`。
    pub fn fare_estimate(&self) -> Option<u64> {
        let destination = self.destination?;
        let distance_km = self.pickup.distance_to(&destination) / 1000.0;
        Some(self.ride_class.fare_for(distance_km))
    }
}

/// 配車候補のドライバー
///
/// 配車試行ごとに生成される一時的な値で、接続（channel）は保持しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub driver: UserId,
    pub vehicle_rating: f32,
    pub distance_m: f64,
}

/// ドライバーのプロフィール（ユーザーストアの代替）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub driver: UserId,
    pub vehicle_rating: f32,
    pub is_online: bool,
    pub is_available: bool,
}

impl DriverProfile {
    /// 指定クラスの配車を引き受けられるか
    pub fn is_eligible_for(&self, ride_class: RideClass) -> bool {
        self.is_online && self.is_available && self.vehicle_rating >= ride_class.min_vehicle_rating()
    }
}

/// Ride の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Accepted,
    Arrived,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// `self` から `next` への遷移が許されるか
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Accepted, Arrived)
                | (Accepted, Started)
                | (Arrived, Started)
                | (Started, Completed)
                | (Accepted, Cancelled)
                | (Arrived, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// マッチングが確定した Ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub request_id: RideRequestId,
    pub requester: UserId,
    pub driver: UserId,
    pub pickup: Coordinate,
    pub ride_class: RideClass,
    pub status: RideStatus,
    pub created_at: Timestamp,
}

impl Ride {
    /// 配車リクエストと承諾したドライバーから Ride を作成
    pub fn from_request(id: RideId, request: &RideRequest, driver: UserId, created_at: Timestamp) -> Self {
        Self {
            id,
            request_id: request.id.clone(),
            requester: request.requester.clone(),
            driver,
            pickup: request.pickup,
            ride_class: request.ride_class,
            status: RideStatus::Accepted,
            created_at,
        }
    }

    /// 乗客またはドライバーとしてこの Ride に関わっているか
    pub fn involves(&self, user: &UserId) -> bool {
        &self.requester == user || &self.driver == user
    }

    /// 状態を遷移させる
    pub fn transition_to(&mut self, next: RideStatus) -> Result<(), RideStatusError> {
        if !self.status.can_transition_to(next) {
            return Err(RideStatusError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// チャットメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: UserId,
    pub body: MessageBody,
    pub sent_at: Timestamp,
}

impl ChatMessage {
    pub fn new(sender: UserId, body: MessageBody, sent_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            body,
            sent_at,
        }
    }
}

/// 1 つの Ride に紐づく 2 人用チャットルーム
///
/// メッセージは追記のみで、変更・削除されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub ride_id: RideId,
    pub participants: [UserId; 2],
    pub messages: Vec<ChatMessage>,
    pub created_at: Timestamp,
}

impl ChatRoom {
    pub fn new(
        id: ChatRoomId,
        ride_id: RideId,
        participants: [UserId; 2],
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            ride_id,
            participants,
            messages: Vec::new(),
            created_at,
        }
    }

    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// 順序を問わず同じ 2 人のルームか
    pub fn has_pair(&self, a: &UserId, b: &UserId) -> bool {
        self.is_participant(a) && self.is_participant(b)
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

/// ドライバーの位置情報サンプル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub driver: UserId,
    pub coordinate: Coordinate,
    pub recorded_at: Timestamp,
}

/// 認証済みの接続主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// ログイン済みのユーザー（乗客またはドライバー）
    User(UserId),
    /// 特定 Ride の位置追跡のみを許可された接続
    RideTracker { observer: UserId, ride_id: RideId },
}

impl Principal {
    /// Connection Registry に登録する識別子
    pub fn identity(&self) -> &UserId {
        match self {
            Principal::User(id) => id,
            Principal::RideTracker { observer, .. } => observer,
        }
    }
}

/// 接続時に提示される資格情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: Option<String>,
    pub ride_tracking_id: Option<String>,
}

impl Credentials {
    /// ride tracking 接続として解釈できる場合はその Ride ID を返す
    pub fn tracking_ride_id(&self) -> Option<Result<RideId, ValueObjectError>> {
        self.ride_tracking_id.clone().map(RideId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_test_ride() -> Ride {
        let request = RideRequest::new(
            RideRequestId::new("req-1".to_string()).unwrap(),
            user("passenger"),
            Coordinate::new(3.38, 6.52).unwrap(),
            RideClass::Standard,
            Timestamp::new(1000),
        );
        Ride::from_request(
            RideId::new("ride-1".to_string()).unwrap(),
            &request,
            user("driver"),
            Timestamp::new(2000),
        )
    }

    #[test]
    fn test_fare_estimate_scales_with_ride_class() {
        // テスト項目: 運賃の見積もりは距離とクラスの倍率で決まり、降車地点がなければ出さない
        // given (前提条件):
        let pickup = Coordinate::new(3.38, 6.52).unwrap();
        let destination = Coordinate::new(3.38, 6.61).unwrap();
        let request = |ride_class| {
            RideRequest::new(
                RideRequestId::new("req-1".to_string()).unwrap(),
                user("passenger"),
                pickup,
                ride_class,
                Timestamp::new(0),
            )
        };

        // when (操作):
        let urban = request(RideClass::Urban).with_destination(destination).fare_estimate();
        let elite = request(RideClass::Elite).with_destination(destination).fare_estimate();
        let unknown = request(RideClass::Urban).fare_estimate();

        // then (期待する結果):
        let distance_km = pickup.distance_to(&destination) / 1000.0;
        assert_eq!(urban, Some(RideClass::Urban.fare_for(distance_km)));
        assert!(elite.unwrap() > urban.unwrap());
        assert_eq!(unknown, None);
    }

    #[test]
    fn test_ride_from_request_links_both_parties() {
        // テスト項目: Ride はリクエストの乗客と承諾ドライバーを外部キーで保持する
        // given (前提条件) / when (操作):
        let ride = create_test_ride();

        // then (期待する結果):
        assert_eq!(ride.request_id.as_str(), "req-1");
        assert_eq!(ride.status, RideStatus::Accepted);
        assert!(ride.involves(&user("passenger")));
        assert!(ride.involves(&user("driver")));
        assert!(!ride.involves(&user("stranger")));
    }

    #[test]
    fn test_ride_happy_path_transitions() {
        // テスト項目: accepted → arrived → started → completed の遷移が成功する
        // given (前提条件):
        let mut ride = create_test_ride();

        // when (操作) / then (期待する結果):
        assert!(ride.transition_to(RideStatus::Arrived).is_ok());
        assert!(ride.transition_to(RideStatus::Started).is_ok());
        assert!(ride.transition_to(RideStatus::Completed).is_ok());
        assert_eq!(ride.status, RideStatus::Completed);
    }

    #[test]
    fn test_ride_rejects_illegal_transitions() {
        // テスト項目: 開始済みの Ride はキャンセルできず、完了済みの Ride は再開できない
        // given (前提条件):
        let mut ride = create_test_ride();
        ride.transition_to(RideStatus::Started).unwrap();

        // when (操作):
        let cancel = ride.transition_to(RideStatus::Cancelled);

        // then (期待する結果):
        assert_eq!(
            cancel,
            Err(RideStatusError {
                from: RideStatus::Started,
                to: RideStatus::Cancelled,
            })
        );
        ride.transition_to(RideStatus::Completed).unwrap();
        assert!(ride.transition_to(RideStatus::Started).is_err());
    }

    #[test]
    fn test_chat_room_pair_is_unordered() {
        // テスト項目: チャットルームの参加者ペアは順序に依存しない
        // given (前提条件):
        let room = ChatRoom::new(
            ChatRoomId::generate(),
            RideId::new("ride-1".to_string()).unwrap(),
            [user("alice"), user("bob")],
            Timestamp::new(0),
        );

        // when (操作) / then (期待する結果):
        assert!(room.has_pair(&user("alice"), &user("bob")));
        assert!(room.has_pair(&user("bob"), &user("alice")));
        assert!(!room.has_pair(&user("alice"), &user("carol")));
    }

    #[test]
    fn test_driver_eligibility() {
        // テスト項目: オンラインかつ空車で、レーティングが条件を満たすドライバーのみ対象
        // given (前提条件):
        let mut profile = DriverProfile {
            driver: user("driver"),
            vehicle_rating: 4.0,
            is_online: true,
            is_available: true,
        };

        // when (操作) / then (期待する結果):
        assert!(profile.is_eligible_for(RideClass::Standard));
        assert!(!profile.is_eligible_for(RideClass::Elite));
        profile.is_available = false;
        assert!(!profile.is_eligible_for(RideClass::Urban));
    }

    #[test]
    fn test_principal_identity() {
        // テスト項目: Principal から Registry 登録用の識別子が得られる
        // given (前提条件):
        let ride_id = RideId::new("ride-1".to_string()).unwrap();
        let observer = UserId::tracking_observer(&ride_id);
        let tracker = Principal::RideTracker {
            observer: observer.clone(),
            ride_id,
        };

        // when (操作) / then (期待する結果):
        assert_eq!(tracker.identity(), &observer);
        assert_eq!(Principal::User(user("alice")).identity(), &user("alice"));
    }
}
