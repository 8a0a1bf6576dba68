// Administrative endpoints
//
// Host and hostgroup changes go to `api` as `<opsview>` XML; acknowledgements
// go to the status page's form handler.

use chrono::NaiveDateTime;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info};

use crate::client::{ACKNOWLEDGE_PATH, OpsviewClient};
use crate::command::{self, AckOptions, AckTarget, Acknowledgements, Fields};
use crate::document::Document;
use crate::error::Error;
use crate::filter::StatusFilter;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

impl OpsviewClient {
    /// Create a host. `attrs` must contain `name` and `ip`.
    ///
    /// `POST api` with `<host action="create">`
    pub async fn create_host(&self, attrs: &Fields) -> Result<Document, Error> {
        let body = command::create_host(attrs)?;
        debug!(name = ?attrs.get("name"), "creating host");
        self.send_command(body).await
    }

    /// Create a host by cloning `source_name`, overriding `attrs`.
    pub async fn clone_host(&self, source_name: &str, attrs: &Fields) -> Result<Document, Error> {
        let body = command::clone_host(source_name, attrs)?;
        debug!(source_name, "cloning host");
        self.send_command(body).await
    }

    /// Delete a host by id (all digits) or name.
    pub async fn delete_host(&self, host: &str) -> Result<Document, Error> {
        debug!(host, "deleting host");
        self.send_command(command::delete_host(host)).await
    }

    /// Schedule downtime for a hostgroup by id or name.
    pub async fn schedule_downtime(
        &self,
        hostgroup: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        comment: &str,
    ) -> Result<Document, Error> {
        debug!(hostgroup, %start, %end, "scheduling downtime");
        self.send_command(command::schedule_downtime(hostgroup, start, end, comment))
            .await
    }

    pub async fn disable_scheduled_downtime(&self, hostgroup: &str) -> Result<Document, Error> {
        debug!(hostgroup, "cancelling downtime");
        self.send_command(command::disable_scheduled_downtime(hostgroup))
            .await
    }

    pub async fn enable_notifications(&self, hostgroup: &str) -> Result<Document, Error> {
        debug!(hostgroup, "enabling notifications");
        self.send_command(command::enable_notifications(hostgroup))
            .await
    }

    pub async fn disable_notifications(&self, hostgroup: &str) -> Result<Document, Error> {
        debug!(hostgroup, "disabling notifications");
        self.send_command(command::disable_notifications(hostgroup))
            .await
    }

    /// Reload the server's configuration.
    pub async fn reload(&self) -> Result<Document, Error> {
        info!("reloading opsview configuration");
        self.send_command(command::reload()).await
    }

    // ── Acknowledgements ─────────────────────────────────────────────

    /// Acknowledge every target in one form POST.
    ///
    /// Returns the handler's reply body unparsed: it is an HTML page, not
    /// an API document.
    pub async fn acknowledge(
        &self,
        targets: &Acknowledgements,
        comment: &str,
        options: &AckOptions,
    ) -> Result<String, Error> {
        let form = command::acknowledge(self.base_url().as_str(), targets, comment, options);
        debug!(targets = targets.iter().count(), "sending acknowledgements");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        self.post(ACKNOWLEDGE_PATH, command::encode_form(&form), headers)
            .await
    }

    pub async fn acknowledge_service(
        &self,
        host: &str,
        service: &str,
        comment: &str,
        options: &AckOptions,
    ) -> Result<String, Error> {
        let targets = Acknowledgements::new().service(host, service);
        self.acknowledge(&targets, comment, options).await
    }

    pub async fn acknowledge_host(
        &self,
        host: &str,
        comment: &str,
        options: &AckOptions,
    ) -> Result<String, Error> {
        let targets = Acknowledgements::new().host(host);
        self.acknowledge(&targets, comment, options).await
    }

    /// Acknowledge every host and service on its final check attempt.
    ///
    /// Only warning, critical and unhandled entries are considered. Returns
    /// `None` without sending anything when nothing is alerting.
    pub async fn acknowledge_all(
        &self,
        comment: &str,
        options: &AckOptions,
    ) -> Result<Option<String>, Error> {
        let status = self
            .get_status_all(&[
                StatusFilter::Warning,
                StatusFilter::Critical,
                StatusFilter::Unhandled,
            ])
            .await?;

        let mut targets = Acknowledgements::new();
        for host in status.children() {
            let Some(host_name) = host.name() else {
                continue;
            };
            if host.is_alerting() {
                targets.add(host_name.clone(), AckTarget::Host);
            }
            for service in host.children().iter().filter(|s| s.is_alerting()) {
                if let Some(service_name) = service.name() {
                    targets.add(host_name.clone(), AckTarget::Service(service_name));
                }
            }
        }

        if targets.is_empty() {
            debug!("nothing alerting, no acknowledgement sent");
            return Ok(None);
        }
        self.acknowledge(&targets, comment, options).await.map(Some)
    }
}
