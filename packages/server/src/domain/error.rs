//! ドメイン層のエラー定義

use thiserror::Error;

use super::entity::RideStatus;

/// Value Object 生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// 外部ストア（永続化層）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("ride not found: {0}")]
    RideNotFound(String),
    #[error("chat room not found: {0}")]
    ChatRoomNotFound(String),
    #[error("ride request already has a ride: {0}")]
    DuplicateRide(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// 接続へのメッセージ送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client not found: {0}")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
    #[error("failed to serialize event: {0}")]
    Serialization(String),
}

/// Ride の状態遷移エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ride cannot move from {from} to {to}")]
pub struct RideStatusError {
    pub from: RideStatus,
    pub to: RideStatus,
}

/// 接続の認証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication credentials not provided")]
    MissingCredentials,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// 候補ドライバー取得（geospatial query）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("candidate query failed: {0}")]
pub struct CandidateQueryError(pub String);
