//! UseCase: 通話のシグナリング
//!
//! 発信者の peer id を着信側へ中継し、着信側が自分の peer id を返すか
//! 拒否するかタイムアウトするまで待つ。メディアは扱わない。
//!
//! ```text
//! call:request ──▶ call:incoming（着信側）
//!                    │ call:request:response { peer_id }
//!                    ▼
//!   peer_id あり: 発信者へ peer_id / なし: 拒否 / 期限切れ: call:timeout（着信側）
//! ```
//!
//! 着信側ごとに保留中の呼び出しは 1 件まで。待機は配車のオファーと同じく
//! `oneshot` 受信側への `tokio::time::timeout` で行う。

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::{ConnectionRegistry, MessagePushError, ServerEvent, UserId};

use super::error::CallError;

/// 着信に応答するまでの待機時間のデフォルト
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

const CALL_TIMEOUT_MESSAGE: &str = "Call timeout";

struct PendingCall {
    call_id: Uuid,
    caller: UserId,
    reply: oneshot::Sender<Option<String>>,
}

/// 待機を抜けたら（タスクの中断を含む）保留中の呼び出しを外す
struct PendingGuard<'a> {
    pending: &'a DashMap<UserId, PendingCall>,
    target: UserId,
    call_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .remove_if(&self.target, |_, call| call.call_id == self.call_id);
    }
}

/// 通話シグナリングのユースケース
pub struct CallSignalUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    /// 着信側 → 保留中の呼び出し
    pending: DashMap<UserId, PendingCall>,
    timeout: Duration,
}

impl CallSignalUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            pending: DashMap::new(),
            timeout,
        }
    }

    /// 着信側を呼び出し、応答した peer id を返す
    pub async fn request(
        &self,
        caller: &UserId,
        target: &UserId,
        peer_id: String,
    ) -> Result<String, CallError> {
        if caller == target {
            return Err(CallError::SelfCall);
        }
        if peer_id.trim().is_empty() {
            return Err(CallError::EmptyPeerId);
        }
        if self.registry.lookup(target).is_none() {
            return Err(CallError::TargetOffline);
        }

        let call_id = Uuid::new_v4();
        let (tx, mut rx) = oneshot::channel();
        match self.pending.entry(target.clone()) {
            Entry::Occupied(_) => return Err(CallError::TargetBusy),
            Entry::Vacant(entry) => {
                entry.insert(PendingCall {
                    call_id,
                    caller: caller.clone(),
                    reply: tx,
                });
            }
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            target: target.clone(),
            call_id,
        };

        let incoming = ServerEvent::CallIncoming {
            caller: caller.clone(),
            peer_id,
        };
        if let Err(e) = self.registry.push_event(target, &incoming) {
            return Err(match e {
                MessagePushError::Serialization(_) => CallError::Push(e),
                // lookup と送信の間に切断された
                _ => CallError::TargetOffline,
            });
        }
        tracing::debug!(caller = %caller, target = %target, "call:incoming sent");

        let answer = match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => None,
            Err(_) => {
                let removed = self
                    .pending
                    .remove_if(target, |_, call| call.call_id == call_id);
                if removed.is_none() {
                    // タイムアウトと同時に応答が届いていた
                    rx.try_recv().ok().flatten()
                } else {
                    tracing::info!(caller = %caller, target = %target, "call timed out");
                    let timed_out = ServerEvent::CallTimeout {
                        caller: caller.clone(),
                        message: CALL_TIMEOUT_MESSAGE.to_string(),
                    };
                    if let Err(e) = self.registry.push_event(target, &timed_out) {
                        tracing::debug!(target = %target, error = %e, "call:timeout not delivered");
                    }
                    return Err(CallError::Timeout);
                }
            }
        };

        match answer {
            Some(peer) if !peer.trim().is_empty() => {
                tracing::info!(caller = %caller, target = %target, "call accepted");
                Ok(peer)
            }
            _ => {
                tracing::info!(caller = %caller, target = %target, "call rejected");
                Err(CallError::Rejected)
            }
        }
    }

    /// 着信に応答する。`peer_id` が `None` なら拒否
    ///
    /// 応答した呼び出しの発信者を返す。
    pub fn respond(&self, target: &UserId, peer_id: Option<String>) -> Result<UserId, CallError> {
        let (_, call) = self
            .pending
            .remove(target)
            .ok_or(CallError::NoPendingCall)?;
        if call.reply.send(peer_id).is_err() {
            tracing::debug!(caller = %call.caller, target = %target, "caller stopped waiting");
        }
        Ok(call.caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::PusherChannel, infrastructure::connection::InMemoryConnectionRegistry};
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 着信側が未接続・通話中・本人の場合の即時エラー
    // - 応答（peer id あり / なし）がそのまま発信者の結果になること
    // - タイムアウトで着信側に call:timeout が届き、以後の応答は受け付けないこと
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_usecase() -> (Arc<CallSignalUseCase>, Arc<InMemoryConnectionRegistry>) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let usecase = Arc::new(CallSignalUseCase::new(
            registry.clone(),
            Duration::from_secs(30),
        ));
        (usecase, registry)
    }

    fn connect(
        registry: &InMemoryConnectionRegistry,
        id: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx): (PusherChannel, _) = mpsc::unbounded_channel();
        registry.register(user(id), tx);
        rx
    }

    fn frame(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    fn spawn_request(
        usecase: &Arc<CallSignalUseCase>,
        caller: &str,
        target: &str,
    ) -> tokio::task::JoinHandle<Result<String, CallError>> {
        let usecase = usecase.clone();
        let (caller, target) = (user(caller), user(target));
        tokio::spawn(async move {
            usecase
                .request(&caller, &target, "peer-alice".to_string())
                .await
        })
    }

    #[tokio::test]
    async fn test_offline_target_is_rejected_immediately() {
        // テスト項目: 未接続の相手への発信は即座に "targetuser is offline"
        // given (前提条件):
        let (usecase, _registry) = create_usecase();

        // when (操作):
        let result = usecase
            .request(&user("alice"), &user("bob"), "peer-alice".to_string())
            .await;

        // then (期待する結果):
        let error = result.unwrap_err();
        assert!(matches!(error, CallError::TargetOffline));
        assert_eq!(error.client_message(), "targetuser is offline");
    }

    #[tokio::test]
    async fn test_accepted_call_returns_target_peer_id() {
        // テスト項目: 着信側が peer id を返すと発信者にその peer id が返る
        // given (前提条件):
        let (usecase, registry) = create_usecase();
        let mut bob_rx = connect(&registry, "bob");
        let running = spawn_request(&usecase, "alice", "bob");
        let incoming: serde_json::Value =
            serde_json::from_str(&bob_rx.recv().await.unwrap()).unwrap();

        // when (操作):
        let caller = usecase
            .respond(&user("bob"), Some("peer-bob".to_string()))
            .unwrap();
        let result = running.await.unwrap();

        // then (期待する結果):
        assert_eq!(incoming["type"], "call:incoming");
        assert_eq!(incoming["caller"], "alice");
        assert_eq!(incoming["peer_id"], "peer-alice");
        assert_eq!(caller, user("alice"));
        assert_eq!(result.unwrap(), "peer-bob");
    }

    #[tokio::test]
    async fn test_answer_without_peer_id_is_rejection() {
        // テスト項目: peer id なしの応答は "targetuser rejected call"
        // given (前提条件):
        let (usecase, registry) = create_usecase();
        let mut bob_rx = connect(&registry, "bob");
        let running = spawn_request(&usecase, "alice", "bob");
        bob_rx.recv().await.unwrap();

        // when (操作):
        usecase.respond(&user("bob"), None).unwrap();
        let error = running.await.unwrap().unwrap_err();

        // then (期待する結果):
        assert!(matches!(error, CallError::Rejected));
        assert_eq!(error.client_message(), "targetuser rejected call");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_call_times_out() {
        // テスト項目: 応答がなければタイムアウトし、着信側に call:timeout が届く。その後の応答は受け付けない
        // given (前提条件):
        let (usecase, registry) = create_usecase();
        let mut bob_rx = connect(&registry, "bob");
        let start = tokio::time::Instant::now();

        // when (操作):
        let result = usecase
            .request(&user("alice"), &user("bob"), "peer-alice".to_string())
            .await;
        let late = usecase.respond(&user("bob"), Some("peer-bob".to_string()));

        // then (期待する結果):
        assert!(matches!(result, Err(CallError::Timeout)));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(matches!(late, Err(CallError::NoPendingCall)));
        assert_eq!(frame(&mut bob_rx)["type"], "call:incoming");
        let timeout = frame(&mut bob_rx);
        assert_eq!(timeout["type"], "call:timeout");
        assert_eq!(timeout["message"], "Call timeout");
    }

    #[tokio::test]
    async fn test_second_caller_gets_busy() {
        // テスト項目: 着信中の相手への別の発信は TargetBusy になり、先の呼び出しは生きている
        // given (前提条件):
        let (usecase, registry) = create_usecase();
        let mut bob_rx = connect(&registry, "bob");
        let first = spawn_request(&usecase, "alice", "bob");
        bob_rx.recv().await.unwrap();

        // when (操作):
        let second = usecase
            .request(&user("carol"), &user("bob"), "peer-carol".to_string())
            .await;

        // then (期待する結果):
        assert!(matches!(second, Err(CallError::TargetBusy)));
        usecase
            .respond(&user("bob"), Some("peer-bob".to_string()))
            .unwrap();
        assert_eq!(first.await.unwrap().unwrap(), "peer-bob");
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        // テスト項目: 自分自身への発信と空の peer id は拒否され、着信は送られない
        // given (前提条件):
        let (usecase, registry) = create_usecase();
        let mut bob_rx = connect(&registry, "bob");

        // when (操作):
        let self_call = usecase
            .request(&user("bob"), &user("bob"), "peer-bob".to_string())
            .await;
        let empty_peer = usecase
            .request(&user("alice"), &user("bob"), "  ".to_string())
            .await;

        // then (期待する結果):
        assert!(matches!(self_call, Err(CallError::SelfCall)));
        assert!(matches!(empty_peer, Err(CallError::EmptyPeerId)));
        assert!(bob_rx.try_recv().is_err());
        assert!(matches!(
            usecase.respond(&user("bob"), None),
            Err(CallError::NoPendingCall)
        ));
    }
}
