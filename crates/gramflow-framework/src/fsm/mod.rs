//! Finite state machine.
//!
//! Conversation state lives in a [`BaseStorage`] under a [`StorageKey`]
//! derived from the update by [`FsmContextMiddleware`] according to an
//! [`FsmStrategy`]. Handlers receive an [`FsmContext`] bound to that key:
//!
//! ```rust,ignore
//! static FORM: LazyLock<StatesGroup> = LazyLock::new(|| StatesGroup::new("Form"));
//!
//! async fn ask_name(message: Message, state: FsmContext) -> DispatchResult<()> {
//!     state.set_state(&FORM.state("name")).await?;
//!     Ok(())
//! }
//!
//! router.message().register(ask_name, Command::new(["start"]));
//! router
//!     .message()
//!     .register(got_name, StateFilter::new([FORM.state("name")]));
//! ```

mod context;
mod middleware;
mod state;
mod storage;
mod strategy;

pub use context::FsmContext;
pub use middleware::FsmContextMiddleware;
pub use state::{State, StatesGroup};
pub use storage::{BaseStorage, DEFAULT_DESTINY, MemoryStorage, StorageData, StorageKey};
pub use strategy::FsmStrategy;
