//! UseCase 層のエラー定義
//!
//! UI 層はこれらを HTTP ステータスコードや `response:<event>` のエラー文字列に変換する。
//! ストア障害などの内部エラーは `client_message()` で汎用メッセージに置き換え、
//! 詳細はログにのみ出力する。

use thiserror::Error;

use crate::domain::{
    AuthError, CandidateQueryError, MessagePushError, RepositoryError, RideStatusError,
    ValueObjectError,
};

/// クライアントに返す内部エラーの汎用メッセージ
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong";

/// 接続処理のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("authentication failed: {0}")]
    Unauthenticated(#[from] AuthError),
}

/// 配車処理のエラー
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("ride request {0} is already being dispatched")]
    AlreadyDispatching(String),
    #[error("ride request {0} is already matched")]
    AlreadyMatched(String),
    #[error("no pending offer for ride request {0}")]
    NoPendingOffer(String),
    #[error("ride request {0} not found")]
    RequestNotFound(String),
    #[error("ride already {}", .0.from)]
    InvalidTransition(#[from] RideStatusError),
    #[error(transparent)]
    CandidateQuery(#[from] CandidateQueryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DispatchError {
    pub fn client_message(&self) -> String {
        match self {
            DispatchError::CandidateQuery(_) | DispatchError::Repository(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// チャット処理のエラー
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("cannot start a chat with yourself")]
    SelfChat,
    #[error("ride not found: {0}")]
    RideNotFound(String),
    #[error("user {user} is not part of ride {ride}")]
    NotPartOfRide { user: String, ride: String },
    #[error("chat room not found: {0}")]
    RoomNotFound(String),
    #[error("not a member of chat room {0}")]
    NotAMember(String),
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValueObjectError),
    #[error(transparent)]
    Push(#[from] MessagePushError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ChatError {
    pub fn client_message(&self) -> String {
        match self {
            ChatError::Push(_) | ChatError::Repository(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// 位置情報処理のエラー
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValueObjectError),
    #[error("tracking connections may only join the tracking room")]
    NotPermitted,
    #[error(transparent)]
    Push(#[from] MessagePushError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LocationError {
    pub fn client_message(&self) -> String {
        match self {
            LocationError::Push(_) | LocationError::Repository(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Ride の状態遷移（到着・開始・完了）のエラー
#[derive(Debug, Error)]
pub enum RideLifecycleError {
    #[error("ride not found: {0}")]
    RideNotFound(String),
    #[error("driver {0} is not assigned to this ride")]
    Unauthorized(String),
    #[error(transparent)]
    InvalidTransition(#[from] RideStatusError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RideLifecycleError {
    pub fn client_message(&self) -> String {
        match self {
            RideLifecycleError::Repository(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// 通話シグナリングのエラー
#[derive(Debug, Error)]
pub enum CallError {
    #[error("cannot call yourself")]
    SelfCall,
    #[error("peer_id must not be empty")]
    EmptyPeerId,
    #[error("targetuser is offline")]
    TargetOffline,
    #[error("targetuser is busy")]
    TargetBusy,
    #[error("targetuser rejected call")]
    Rejected,
    #[error("Call timeout")]
    Timeout,
    #[error("no incoming call to answer")]
    NoPendingCall,
    #[error(transparent)]
    Push(#[from] MessagePushError),
}

impl CallError {
    pub fn client_message(&self) -> String {
        match self {
            CallError::Push(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
