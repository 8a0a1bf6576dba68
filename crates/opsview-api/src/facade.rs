// Server / host / service handles
//
// Each handle owns the status tree from its last `update()` and replaces it
// wholesale on the next one. They share one `OpsviewClient` (and so one
// session) through an `Arc`.

use std::fmt;
use std::sync::Arc;

use crate::client::{ClientConfig, OpsviewClient};
use crate::command::AckOptions;
use crate::document::Document;
use crate::error::Error;
use crate::filter::StatusFilter;
use crate::node::StatusNode;
use crate::status::ServiceStatus;

// ── Server ──────────────────────────────────────────────────────────

/// The whole server: every host and service the account can see.
#[derive(Debug)]
pub struct Server {
    client: Arc<OpsviewClient>,
    tree: Option<Arc<StatusNode>>,
}

impl Server {
    pub fn new(client: Arc<OpsviewClient>) -> Self {
        Self { client, tree: None }
    }

    /// Build a client from `config` and wrap it.
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        Ok(Self::new(Arc::new(OpsviewClient::new(config)?)))
    }

    pub fn client(&self) -> &Arc<OpsviewClient> {
        &self.client
    }

    /// The tree from the last `update()`, if any.
    pub fn tree(&self) -> Option<&Arc<StatusNode>> {
        self.tree.as_ref()
    }

    /// Fetch full status and replace the current tree.
    pub async fn update(&mut self, filters: &[StatusFilter]) -> Result<&Arc<StatusNode>, Error> {
        let tree = self.client.get_status_all(filters).await?;
        Ok(&*self.tree.insert(tree))
    }

    pub fn hosts(&self) -> &[Arc<StatusNode>] {
        self.tree.as_deref().map(StatusNode::children).unwrap_or_default()
    }

    /// Handle for a host in the current tree (case-insensitive).
    pub fn host(&self, name: &str) -> Option<Host> {
        let node = self.tree.as_ref()?.child(name)?;
        Some(Host {
            client: Arc::clone(&self.client),
            name: node.name().unwrap_or_else(|| name.to_owned()),
            tree: Some(Arc::clone(node)),
        })
    }

    pub async fn acknowledge_all(
        &self,
        comment: &str,
        options: &AckOptions,
    ) -> Result<Option<String>, Error> {
        self.client.acknowledge_all(comment, options).await
    }

    pub async fn reload(&self) -> Result<Document, Error> {
        self.client.reload().await
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Server({})", self.client)
    }
}

// ── Host ────────────────────────────────────────────────────────────

/// One host and its services.
#[derive(Debug)]
pub struct Host {
    client: Arc<OpsviewClient>,
    name: String,
    tree: Option<Arc<StatusNode>>,
}

impl Host {
    pub fn new(client: Arc<OpsviewClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            tree: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> Option<&Arc<StatusNode>> {
        self.tree.as_ref()
    }

    /// Fetch this host's status and replace the current tree.
    pub async fn update(&mut self, filters: &[StatusFilter]) -> Result<&Arc<StatusNode>, Error> {
        let tree = self.client.get_status_host(&self.name, filters).await?;
        Ok(&*self.tree.insert(tree))
    }

    pub fn services(&self) -> &[Arc<StatusNode>] {
        self.tree.as_deref().map(StatusNode::children).unwrap_or_default()
    }

    /// Handle for a service in the current tree, matched case-insensitively.
    pub fn service(&self, name: &str) -> Result<Service, Error> {
        let not_found = || Error::NotFound {
            what: format!("service {}:{name}", self.name),
        };
        let host = self.tree.as_ref().ok_or_else(not_found)?;
        let service = host.child(name).ok_or_else(not_found)?;
        Ok(Service {
            client: Arc::clone(&self.client),
            host: self.name.clone(),
            name: service.name().unwrap_or_else(|| name.to_owned()),
            status: Some(ServiceStatus {
                host: Arc::clone(host),
                service: Arc::clone(service),
            }),
        })
    }

    pub async fn acknowledge(&self, comment: &str, options: &AckOptions) -> Result<String, Error> {
        self.client
            .acknowledge_host(&self.name, comment, options)
            .await
    }

    pub async fn acknowledge_service(
        &self,
        service: &str,
        comment: &str,
        options: &AckOptions,
    ) -> Result<String, Error> {
        self.client
            .acknowledge_service(&self.name, service, comment, options)
            .await
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({})", self.name)
    }
}

// ── Service ─────────────────────────────────────────────────────────

/// One service on one host.
#[derive(Debug)]
pub struct Service {
    client: Arc<OpsviewClient>,
    host: String,
    name: String,
    status: Option<ServiceStatus>,
}

impl Service {
    pub fn new(client: Arc<OpsviewClient>, host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
            name: name.into(),
            status: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> Option<&Arc<StatusNode>> {
        self.status.as_ref().map(|s| &s.service)
    }

    /// Re-fetch the owning host and pick this service out of it.
    pub async fn update(&mut self) -> Result<&Arc<StatusNode>, Error> {
        let status = self
            .client
            .get_status_service(&self.host, &self.name)
            .await?;
        Ok(&self.status.insert(status).service)
    }

    pub async fn acknowledge(&self, comment: &str, options: &AckOptions) -> Result<String, Error> {
        self.client
            .acknowledge_service(&self.host, &self.name, comment, options)
            .await
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({}:{})", self.host, self.name)
    }
}
