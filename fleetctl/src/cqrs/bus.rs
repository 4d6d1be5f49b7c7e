//! Command and query buses: a map from message name to a type-erased handler.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use super::{Command, CommandHandler, ExecutionContext, Query, QueryHandler};
use crate::errors::{Error, Result};
use crate::types::abbrev_uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("a handler is already registered for {0}")]
    DuplicateHandler(&'static str),
}

/// Handlers keyed by message name. Each value is an `Arc<dyn CommandHandler<C>>` (or query
/// handler) boxed as `Any`, recovered by downcasting to the handler type of the dispatched message.
#[derive(Default)]
struct Registry {
    handlers: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Registry {
    fn insert<H: Any + Send + Sync>(&mut self, name: &'static str, handler: H) -> std::result::Result<(), BusError> {
        match self.handlers.entry(name) {
            Entry::Occupied(_) => Err(BusError::DuplicateHandler(name)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    fn get<H: Any + Clone>(&self, kind: &str, name: &'static str) -> Result<H> {
        self.handlers
            .get(name)
            .and_then(|handler| handler.downcast_ref::<H>())
            .cloned()
            .ok_or_else(|| {
                warn!(name, kind, "No handler registered");
                Error::Internal {
                    operation: format!("dispatch {kind} {name}: no handler registered"),
                }
            })
    }

    fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[derive(Default)]
pub struct CommandBus {
    registry: Registry,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Command>(&mut self, handler: impl CommandHandler<C> + 'static) -> std::result::Result<(), BusError> {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        self.registry.insert(C::NAME, handler)
    }

    pub fn registered(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    pub async fn dispatch<C: Command>(&self, ctx: &ExecutionContext, command: C) -> Result<C::Output> {
        let handler: Arc<dyn CommandHandler<C>> = self.registry.get("command", C::NAME)?;
        let started = Instant::now();
        let result = handler.handle(ctx, command).await;
        debug!(
            command = C::NAME,
            actor = %abbrev_uuid(&ctx.actor.id),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Dispatched command"
        );
        result
    }
}

#[derive(Default)]
pub struct QueryBus {
    registry: Registry,
}

impl QueryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<Q: Query>(&mut self, handler: impl QueryHandler<Q> + 'static) -> std::result::Result<(), BusError> {
        let handler: Arc<dyn QueryHandler<Q>> = Arc::new(handler);
        self.registry.insert(Q::NAME, handler)
    }

    pub fn registered(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    pub async fn dispatch<Q: Query>(&self, ctx: &ExecutionContext, query: Q) -> Result<Q::Output> {
        let handler: Arc<dyn QueryHandler<Q>> = self.registry.get("query", Q::NAME)?;
        let started = Instant::now();
        let result = handler.handle(ctx, query).await;
        debug!(
            query = Q::NAME,
            actor = %abbrev_uuid(&ctx.actor.id),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Dispatched query"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::{CurrentUser, Role};
    use crate::auth::permissions::TenantScope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Ping(u32);

    impl Command for Ping {
        const NAME: &'static str = "Ping";
        type Output = u32;
    }

    struct Count;

    impl Query for Count {
        const NAME: &'static str = "Count";
        type Output = usize;
    }

    #[derive(Clone, Default)]
    struct Counter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CommandHandler<Ping> for Counter {
        async fn handle(&self, _ctx: &ExecutionContext, command: Ping) -> Result<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(command.0 + 1)
        }
    }

    #[async_trait::async_trait]
    impl QueryHandler<Count> for Counter {
        async fn handle(&self, _ctx: &ExecutionContext, _query: Count) -> Result<usize> {
            Ok(self.calls.load(Ordering::SeqCst))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            actor: CurrentUser {
                id: Uuid::new_v4(),
                email: "bus@fleet.test".to_string(),
                display_name: None,
                roles: vec![Role::Admin],
                company_id: None,
                carrier_id: None,
            },
            scope: TenantScope::Global,
        }
    }

    #[tokio::test]
    async fn test_dispatch_invokes_registered_handler() {
        let counter = Counter::default();
        let mut commands = CommandBus::new();
        commands.register::<Ping>(counter.clone()).unwrap();
        let mut queries = QueryBus::new();
        queries.register::<Count>(counter.clone()).unwrap();

        assert_eq!(commands.dispatch(&ctx(), Ping(41)).await.unwrap(), 42);
        assert_eq!(commands.dispatch(&ctx(), Ping(1)).await.unwrap(), 2);
        assert_eq!(queries.dispatch(&ctx(), Count).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_handler_is_internal_error() {
        let bus = CommandBus::new();
        let err = bus.dispatch(&ctx(), Ping(0)).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut bus = CommandBus::new();
        bus.register::<Ping>(Counter::default()).unwrap();
        assert_eq!(bus.register::<Ping>(Counter::default()), Err(BusError::DuplicateHandler("Ping")));
        assert_eq!(bus.registered(), vec!["Ping"]);
    }
}
