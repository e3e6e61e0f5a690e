//! Shared application state.

use std::{sync::Arc, time::Duration};

use ridelink_shared::time::{Clock, SystemClock};

use crate::{
    domain::{ConnectionRegistry, DriverDirectory, LocationStore, RideStore, RoomMembership},
    infrastructure::{
        auth::TrustedQueryAuthenticator,
        connection::{InMemoryConnectionRegistry, InMemoryRoomMembership},
        repository::{
            InMemoryCandidateSupplier, InMemoryChatRoomRepository, InMemoryDriverDirectory,
            InMemoryLocationStore, InMemoryRideStore,
        },
    },
    usecase::{
        CallSignalUseCase, ChatSessionUseCase, ConnectUserUseCase, DisconnectUserUseCase, DispatchConfig,
        DispatchCoordinator, RideLifecycleUseCase, TrackLocationUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectUserUseCase（接続のユースケース）
    pub connect_user: Arc<ConnectUserUseCase>,
    /// DisconnectUserUseCase（切断のユースケース）
    pub disconnect_user: Arc<DisconnectUserUseCase>,
    /// DispatchCoordinator（配車のユースケース）
    pub dispatch: Arc<DispatchCoordinator>,
    /// ChatSessionUseCase（チャットのユースケース）
    pub chat: Arc<ChatSessionUseCase>,
    /// TrackLocationUseCase（位置情報のユースケース）
    pub location: Arc<TrackLocationUseCase>,
    /// CallSignalUseCase（通話シグナリングのユースケース）
    pub call: Arc<CallSignalUseCase>,
    /// RideLifecycleUseCase（Ride の状態遷移のユースケース）
    pub lifecycle: Arc<RideLifecycleUseCase>,
    /// DriverDirectory（ドライバー登録 API 用）
    pub drivers: Arc<dyn DriverDirectory>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire every use case against the in-memory infrastructure
    ///
    /// Dependencies are created in order:
    /// 1. Connection registry and room membership
    /// 2. Repositories and the candidate supplier
    /// 3. UseCases
    pub fn in_memory(config: DispatchConfig, call_timeout: Duration) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // 1. Connection registry and room membership
        let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
        let rooms: Arc<dyn RoomMembership> =
            Arc::new(InMemoryRoomMembership::new(registry.clone()));

        // 2. Repositories
        let rides: Arc<dyn RideStore> = Arc::new(InMemoryRideStore::new());
        let drivers: Arc<dyn DriverDirectory> = Arc::new(InMemoryDriverDirectory::new());
        let locations: Arc<dyn LocationStore> = Arc::new(InMemoryLocationStore::new());
        let chat_rooms = Arc::new(InMemoryChatRoomRepository::new());
        let supplier = Arc::new(InMemoryCandidateSupplier::new(
            drivers.clone(),
            locations.clone(),
        ));

        // 3. UseCases
        let connect_user = Arc::new(ConnectUserUseCase::new(
            Arc::new(TrustedQueryAuthenticator::new()),
            registry.clone(),
            rooms.clone(),
        ));
        let disconnect_user = Arc::new(DisconnectUserUseCase::new(
            registry.clone(),
            rooms.clone(),
        ));
        let dispatch = Arc::new(DispatchCoordinator::new(
            registry.clone(),
            supplier,
            rides.clone(),
            drivers.clone(),
            clock.clone(),
            config,
        ));
        let chat = Arc::new(ChatSessionUseCase::new(
            rides.clone(),
            chat_rooms,
            rooms.clone(),
            registry.clone(),
            clock.clone(),
        ));
        let location = Arc::new(TrackLocationUseCase::new(
            locations,
            rides.clone(),
            rooms,
            clock.clone(),
        ));
        let call = Arc::new(CallSignalUseCase::new(registry.clone(), call_timeout));
        let lifecycle = Arc::new(RideLifecycleUseCase::new(rides, drivers.clone(), registry));

        Self {
            connect_user,
            disconnect_user,
            dispatch,
            chat,
            location,
            call,
            lifecycle,
            drivers,
            clock,
        }
    }
}
