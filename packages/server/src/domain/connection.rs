//! 接続と配信のインターフェース定義
//!
//! Connection Registry（ユーザー ID → 接続）と Room Membership（ルーム → メンバー）は、
//! 配車・チャット・位置配信のすべてが共有する最も競合の激しい状態である。
//! UseCase 層はこれらの trait にのみ依存する。

use tokio::sync::mpsc;

use super::{
    error::MessagePushError,
    event::ServerEvent,
    value_object::{ConnectionId, RoomId, Timestamp, UserId},
};

/// 接続へ送信するためのチャンネル（シリアライズ済み JSON フレーム）
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// 登録済み接続のスナップショット
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub connected_at: Timestamp,
    pub channel: PusherChannel,
}

/// ユーザー ID から唯一の生存接続を引く Registry
///
/// 同一ユーザーの接続は常に高々 1 つ。新しい接続を登録すると古い接続は即座に到達不能になる。
pub trait ConnectionRegistry: Send + Sync {
    /// 接続を登録し、既存の接続があれば置き換える
    ///
    /// 置き換えられた古い接続は閉じない（呼び出し元の責務）。
    fn register(&self, identity: UserId, channel: PusherChannel) -> ConnectionHandle;

    /// 接続を引く。存在しない場合は「到達不能」として扱い、エラーにはしない
    fn lookup(&self, identity: &UserId) -> Option<PusherChannel>;

    /// 接続を削除する（冪等）
    fn remove(&self, identity: &UserId);

    /// 指定の接続がまだ現役の場合のみ削除する
    ///
    /// 置き換え済みの古い接続の切断処理が新しい接続を消さないために使う。
    fn remove_connection(&self, identity: &UserId, connection_id: ConnectionId) -> bool;

    /// 特定ユーザーへフレームを送信する
    fn push_to(&self, identity: &UserId, frame: &str) -> Result<(), MessagePushError> {
        let channel = self
            .lookup(identity)
            .ok_or_else(|| MessagePushError::ClientNotFound(identity.to_string()))?;
        channel
            .send(frame.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    /// イベントをシリアライズして特定ユーザーへ送信する
    fn push_event(&self, identity: &UserId, event: &ServerEvent) -> Result<(), MessagePushError> {
        let frame = event.to_frame()?;
        self.push_to(identity, &frame)
    }

    /// 接続中のユーザー数
    fn connection_count(&self) -> usize;
}

/// ルームごとのメンバー集合と、メンバーへの一斉配信
///
/// メンバー集合は明示的な join によってのみ増え、leave によってのみ減る。
pub trait RoomMembership: Send + Sync {
    /// ルームに参加する。既に参加済みなら何もしない
    ///
    /// 新たに参加した場合は `true` を返す。
    fn join(&self, identity: &UserId, room_id: &RoomId) -> bool;

    /// ルームから退出する。退出した場合は `true` を返す
    fn leave(&self, identity: &UserId, room_id: &RoomId) -> bool;

    fn is_member(&self, identity: &UserId, room_id: &RoomId) -> bool;

    /// メンバー一覧（ソート済み）
    fn members(&self, room_id: &RoomId) -> Vec<UserId>;

    fn has_members(&self, room_id: &RoomId) -> bool {
        !self.members(room_id).is_empty()
    }

    /// Registry で解決できるメンバー全員に配信し、配信できた数を返す
    ///
    /// 解決できないメンバーは黙ってスキップする（エラーにも再送にもしない）。
    fn broadcast(&self, room_id: &RoomId, frame: &str) -> usize;

    /// イベントをシリアライズしてルームへ配信する
    fn broadcast_event(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
    ) -> Result<usize, MessagePushError> {
        let frame = event.to_frame()?;
        Ok(self.broadcast(room_id, &frame))
    }
}
