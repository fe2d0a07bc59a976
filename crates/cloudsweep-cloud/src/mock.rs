//! In-memory provider used by the engine tests

use crate::error::ProviderError;
use crate::filter::ResourceFilter;
use crate::provider::{AuthStatus, CloudProvider};
use crate::resource::{Binding, Provider, ResourceDescriptor, ResourceKey, ResourceKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MockState {
    resources: Vec<ResourceDescriptor>,
    bindings: HashMap<ResourceKey, Vec<Binding>>,
    list_failures: HashMap<ResourceKind, ProviderError>,
    iam_failures: HashMap<ResourceKey, ProviderError>,
    /// Errors returned by successive delete calls before succeeding
    delete_script: HashMap<ResourceKey, VecDeque<ProviderError>>,
    /// Per-resource delete latency, overriding `delete_delay`
    slow_deletes: HashMap<ResourceKey, Duration>,
    delete_calls: Vec<ResourceKey>,
    list_calls: usize,
}

pub struct MockProvider {
    provider: Provider,
    authenticated: bool,
    list_delay: Option<Duration>,
    delete_delay: Option<Duration>,
    iam_delay: Option<Duration>,
    cancel_on_delete: Option<CancellationToken>,
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    iam_in_flight: AtomicUsize,
    max_iam_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            authenticated: true,
            list_delay: None,
            delete_delay: None,
            iam_delay: None,
            cancel_on_delete: None,
            state: Mutex::new(MockState::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            iam_in_flight: AtomicUsize::new(0),
            max_iam_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn gcp() -> Self {
        Self::new(Provider::Gcp)
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub fn with_iam_delay(mut self, delay: Duration) -> Self {
        self.iam_delay = Some(delay);
        self
    }

    /// Fire `token` as soon as the first delete call arrives
    pub fn cancelling_on_delete(mut self, token: CancellationToken) -> Self {
        self.cancel_on_delete = Some(token);
        self
    }

    pub fn with_resource(self, descriptor: ResourceDescriptor) -> Self {
        self.state.lock().unwrap().resources.push(descriptor);
        self
    }

    pub fn with_resources(self, descriptors: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        self.state.lock().unwrap().resources.extend(descriptors);
        self
    }

    pub fn with_binding(self, owner: &ResourceDescriptor, binding: Binding) -> Self {
        self.state
            .lock()
            .unwrap()
            .bindings
            .entry(owner.key())
            .or_default()
            .push(binding);
        self
    }

    pub fn failing_list(self, kind: ResourceKind, error: ProviderError) -> Self {
        self.state.lock().unwrap().list_failures.insert(kind, error);
        self
    }

    pub fn failing_iam(self, owner: &ResourceDescriptor, error: ProviderError) -> Self {
        self.state.lock().unwrap().iam_failures.insert(owner.key(), error);
        self
    }

    pub fn scripted_delete(
        self,
        descriptor: &ResourceDescriptor,
        errors: impl IntoIterator<Item = ProviderError>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .delete_script
            .insert(descriptor.key(), errors.into_iter().collect());
        self
    }

    pub fn with_slow_delete(self, descriptor: &ResourceDescriptor, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .slow_deletes
            .insert(descriptor.key(), delay);
        self
    }

    pub fn delete_calls(&self) -> Vec<ResourceKey> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_iam_in_flight(&self) -> usize {
        self.max_iam_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn display_name(&self) -> &str {
        "Mock"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn scope_id(&self) -> &str {
        "mock-project"
    }

    async fn check_auth(&self) -> Result<AuthStatus, ProviderError> {
        if self.authenticated {
            Ok(AuthStatus::ok("tester@mock"))
        } else {
            Ok(AuthStatus::failed("no credentials"))
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        _filter: &ResourceFilter,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if let Some(error) = state.list_failures.get(&kind) {
            return Err(error.clone());
        }
        Ok(state
            .resources
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ProviderError> {
        if let Some(token) = &self.cancel_on_delete {
            token.cancel();
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let slow = self
            .state
            .lock()
            .unwrap()
            .slow_deletes
            .get(&descriptor.key())
            .copied();
        if let Some(delay) = slow.or(self.delete_delay) {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.delete_calls.push(descriptor.key());
            state
                .delete_script
                .get_mut(&descriptor.key())
                .and_then(|queue| queue.pop_front())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn list_iam_bindings(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Vec<Binding>, ProviderError> {
        let now = self.iam_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_iam_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.iam_delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let state = self.state.lock().unwrap();
            match state.iam_failures.get(&descriptor.key()) {
                Some(error) => Err(error.clone()),
                None => Ok(state
                    .bindings
                    .get(&descriptor.key())
                    .cloned()
                    .unwrap_or_default()),
            }
        };

        self.iam_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
