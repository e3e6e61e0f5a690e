//! Value Object 定義
//!
//! 識別子・座標・メッセージ本文など、不変で値によって比較されるドメインモデル。
//! 生成時にバリデーションを行い、不正な値を持つインスタンスは存在しない。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

/// 識別子の最大長
pub const MAX_ID_LENGTH: usize = 128;

/// チャットメッセージ本文の最大長（文字数）
pub const MAX_MESSAGE_LENGTH: usize = 2000;

fn validate_id(field: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if value.chars().count() > MAX_ID_LENGTH {
        return Err(ValueObjectError::TooLong {
            field,
            max: MAX_ID_LENGTH,
        });
    }
    Ok(())
}

/// 文字列ベースの識別子 Value Object を定義する
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// バリデーション付きで生成
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validate_id($field, &value)?;
                Ok(Self(value))
            }

            /// 文字列参照を取得
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// 内部の String を取り出す
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// ユーザー識別子（乗客・ドライバー・追跡専用接続の共通キー）
    UserId,
    "user_id"
);

string_id!(
    /// 配車リクエスト識別子
    RideRequestId,
    "ride_request_id"
);

string_id!(
    /// 確定した配車（Ride）の識別子
    RideId,
    "ride_id"
);

string_id!(
    /// チャットルーム識別子
    ChatRoomId,
    "chat_room_id"
);

impl RideRequestId {
    /// UUID v4 から新しい ID を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl RideId {
    /// UUID v4 から新しい ID を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl ChatRoomId {
    /// UUID v4 から新しい ID を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl UserId {
    /// ride tracking 専用接続に割り当てる識別子を生成
    ///
    /// 通常のユーザー ID と衝突しないよう `ride_tracking:` 接頭辞と UUID を付与する。
    pub fn tracking_observer(ride_id: &RideId) -> Self {
        Self(format!("ride_tracking:{}:{}", ride_id.as_str(), Uuid::new_v4()))
    }

    /// ride tracking 専用接続かどうか
    pub fn is_tracking_observer(&self) -> bool {
        self.0.starts_with("ride_tracking:")
    }
}

/// ルーム識別子
///
/// チャットルームと ride tracking ルームは同じメンバーシップ管理を共有するため、
/// 種別ごとの接頭辞で名前空間を分ける。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    /// チャットルームのルーム ID
    pub fn chat(chat_room_id: &ChatRoomId) -> Self {
        Self(format!("chat:{}", chat_room_id.as_str()))
    }

    /// ride tracking ルームのルーム ID
    pub fn ride_tracking(ride_id: &RideId) -> Self {
        Self(format!("ride_tracking:{}", ride_id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 接続ごとに払い出される識別子
///
/// 同一ユーザーの再接続で古い接続が新しい接続を登録解除しないよう区別する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// チャットメッセージ本文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageBody(String);

impl MessageBody {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("message"));
        }
        if value.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ValueObjectError::TooLong {
                field: "message",
                max: MAX_MESSAGE_LENGTH,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageBody {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageBody> for String {
    fn from(value: MessageBody) -> Self {
        value.0
    }
}

/// 地理座標（GeoJSON と同じく経度・緯度の順）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
}

impl Coordinate {
    /// 地球の平均半径（メートル）
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ValueObjectError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValueObjectError::OutOfRange {
                field: "longitude",
                value: longitude,
            });
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValueObjectError::OutOfRange {
                field: "latitude",
                value: latitude,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// haversine 公式による大円距離（メートル）
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let delta_phi = (other.latitude - self.latitude).to_radians();
        let delta_lambda = (other.longitude - self.longitude).to_radians();

        let a = (delta_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        Self::EARTH_RADIUS_M * c
    }
}

impl TryFrom<[f64; 2]> for Coordinate {
    type Error = ValueObjectError;

    fn try_from([longitude, latitude]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(longitude, latitude)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(value: Coordinate) -> Self {
        [value.longitude, value.latitude]
    }
}

/// 車両クラス
///
/// 各クラスは要求する最低車両レーティングを持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideClass {
    Urban,
    Standard,
    Elite,
}

impl RideClass {
    /// このクラスを引き受けられる車両レーティングの下限
    pub fn min_vehicle_rating(&self) -> f32 {
        match self {
            RideClass::Urban => 0.0,
            RideClass::Standard => 3.0,
            RideClass::Elite => 4.5,
        }
    }

    /// 基本料金に掛ける倍率
    pub fn fare_multiplier(&self) -> u64 {
        match self {
            RideClass::Urban => 300,
            RideClass::Standard => 240,
            RideClass::Elite => 360,
        }
    }

    /// 距離（km）に対する運賃
    pub fn fare_for(&self, distance_km: f64) -> u64 {
        let base = FARE_PER_KM * distance_km.max(0.0);
        // f64 → u64 の変換は上限で飽和する
        (base * self.fare_multiplier() as f64).round() as u64
    }
}

/// 1 km あたりの基本料金
pub const FARE_PER_KM: f64 = 30.0;

/// タイムスタンプ（Unix epoch ミリ秒, UTC）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
