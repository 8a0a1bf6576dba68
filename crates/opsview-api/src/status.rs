// Status endpoints
//
// Read-only queries against `api/status/service` and `api/status/hostgroup`.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::client::{OpsviewClient, STATUS_HOSTGROUP_PATH, STATUS_SERVICE_PATH};
use crate::document::Document;
use crate::error::Error;
use crate::filter::{StatusFilter, query_params};
use crate::node::{NodeKind, StatusNode};

impl OpsviewClient {
    /// Status of every host and service.
    ///
    /// `GET api/status/service?state=…`
    pub async fn get_status_all(&self, filters: &[StatusFilter]) -> Result<Arc<StatusNode>, Error> {
        debug!(?filters, "fetching full status");
        let body = self
            .get(STATUS_SERVICE_PATH, &query_params(filters), HeaderMap::new())
            .await?;
        StatusNode::parse(&body, NodeKind::Server)
    }

    /// Status of one host and its services.
    ///
    /// `GET api/status/service?host={host}`
    pub async fn get_status_host(
        &self,
        host: &str,
        filters: &[StatusFilter],
    ) -> Result<Arc<StatusNode>, Error> {
        debug!(host, ?filters, "fetching host status");
        let mut query = query_params(filters);
        query.push(("host".to_owned(), host.to_owned()));
        let body = self
            .get(STATUS_SERVICE_PATH, &query, HeaderMap::new())
            .await?;
        StatusNode::parse(&body, NodeKind::Host)
    }

    /// Status of one service on a host, matched case-insensitively.
    ///
    /// The returned node's parent is the host node, which lives as long as
    /// the returned `host` handle.
    pub async fn get_status_service(
        &self,
        host: &str,
        service: &str,
    ) -> Result<ServiceStatus, Error> {
        let host_node = self.get_status_host(host, &[]).await?;
        let service_node = host_node
            .child(service)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                what: format!("service {host}:{service}"),
            })?;
        Ok(ServiceStatus {
            host: host_node,
            service: service_node,
        })
    }

    /// Status of the hosts in one hostgroup.
    ///
    /// `GET api/status/service?hostgroupid={id}`
    pub async fn get_status_by_hostgroup(
        &self,
        hostgroup_id: u64,
        filters: &[StatusFilter],
    ) -> Result<Arc<StatusNode>, Error> {
        debug!(hostgroup_id, ?filters, "fetching hostgroup members");
        let mut query = query_params(filters);
        query.push(("hostgroupid".to_owned(), hostgroup_id.to_string()));
        let body = self
            .get(STATUS_SERVICE_PATH, &query, HeaderMap::new())
            .await?;
        StatusNode::parse(&body, NodeKind::Server)
    }

    /// Summary of one top-level hostgroup, or of all of them.
    ///
    /// `GET api/status/hostgroup/{id}`
    pub async fn get_status_hostgroup(&self, hostgroup_id: Option<u64>) -> Result<Document, Error> {
        let path = format!(
            "{STATUS_HOSTGROUP_PATH}/{}",
            hostgroup_id.map(|id| id.to_string()).unwrap_or_default()
        );
        debug!(?hostgroup_id, "fetching hostgroup summary");
        let body = self.get(&path, &[], HeaderMap::new()).await?;
        Document::parse(&body)
    }
}

/// A service node together with the host tree that owns it.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub host: Arc<StatusNode>,
    pub service: Arc<StatusNode>,
}
