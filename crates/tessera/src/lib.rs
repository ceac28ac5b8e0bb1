#![forbid(unsafe_code)]

//! `tessera`
//!
//! Facade over the tessera workspace: a session API that adapts an opaque
//! content-license engine to a media pipeline.
//!
//! Startup wiring is explicit: build the host services, construct the engine
//! with them, then hand the engine to a [`SessionRegistry`] and attach the
//! registry as the engine's event listener.
//!
//! ```ignore
//! let storage = Arc::new(MemoryStorage::new());
//! storage.preload_file("cert.bin", device_certificate);
//! let clock = Arc::new(MonotonicClock::new());
//! let timer = Arc::new(TimerScheduler::new());
//!
//! let engine = vendor_engine::build(storage, clock, timer, &config.client)?;
//! let registry = SessionRegistry::new(engine, config);
//! // attach the registry as the engine's event listener, then:
//! let session = registry.create_session(0, "cenc", init_data, aux_data)?;
//! session.run(Some(callbacks));
//! ```

pub use tessera_core::{
    Clock, DecryptRequest, EngineError, EngineEvents, EngineKeyStatus, EngineResult, EngineStatus,
    InitDataType, KeyStatusMap, KeyStatusTag, LicenseEngine, LicenseType, MessageType,
    SessionCallbacks, SessionErrorTag, SessionId, Storage, Timer, TimerClient, TimerContext,
};
pub use tessera_host::{MemoryStorage, MonotonicClock, TimerScheduler};
pub use tessera_session::{
    ClearContent, ClientInfo, RegistryConfig, Session, SessionError, SessionHandle, SessionPhase,
    SessionRegistry, SessionResult,
};
