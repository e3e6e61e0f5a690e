//! UseCase: WebSocket 接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectUserUseCase::execute() メソッド
//! - 認証と Connection Registry への登録
//!
//! ### なぜこのテストが必要か
//! - 同一ユーザーの再接続で古い接続が到達不能になることを保証
//! - ride tracking 接続が追跡ルームに自動参加することを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：ユーザー接続、ride tracking 接続
//! - 異常系：資格情報なし
//! - エッジケース：同一ユーザーの再接続

use std::sync::Arc;

use crate::domain::{
    Authenticator, ConnectionHandle, ConnectionRegistry, Credentials, Principal, PusherChannel,
    RoomId, RoomMembership,
};

use super::error::ConnectError;

/// 認証・登録済みの接続
#[derive(Debug, Clone)]
pub struct ConnectedSession {
    pub principal: Principal,
    pub handle: ConnectionHandle,
}

/// 接続のユースケース
pub struct ConnectUserUseCase {
    /// Authenticator（認証の抽象化）
    authenticator: Arc<dyn Authenticator>,
    /// ConnectionRegistry（接続管理の抽象化）
    registry: Arc<dyn ConnectionRegistry>,
    /// RoomMembership（ルーム管理の抽象化）
    rooms: Arc<dyn RoomMembership>,
}

impl ConnectUserUseCase {
    /// 新しい ConnectUserUseCase を作成
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<dyn ConnectionRegistry>,
        rooms: Arc<dyn RoomMembership>,
    ) -> Self {
        Self {
            authenticator,
            registry,
            rooms,
        }
    }

    /// 接続を実行
    ///
    /// # Arguments
    ///
    /// * `credentials` - 接続時に提示された資格情報
    /// * `channel` - クライアントへのメッセージ送信用チャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectedSession)` - 接続成功（認証結果と登録された接続）
    /// * `Err(ConnectError)` - 認証失敗
    pub async fn execute(
        &self,
        credentials: &Credentials,
        channel: PusherChannel,
    ) -> Result<ConnectedSession, ConnectError> {
        // 1. 認証
        let principal = self.authenticator.authenticate(credentials).await?;

        // 2. Registry に登録（既存の接続は置き換えられる）
        let handle = self.registry.register(principal.identity().clone(), channel);

        // 3. ride tracking 接続は追跡ルームに自動参加
        if let Principal::RideTracker { observer, ride_id } = &principal {
            self.rooms.join(observer, &RoomId::ride_tracking(ride_id));
        }

        tracing::info!(
            user_id = %principal.identity(),
            connection_id = %handle.connection_id,
            "connection registered"
        );
        Ok(ConnectedSession { principal, handle })
    }
}
