//! Typed outgoing requests over an OCPP-J session.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::enums::{RegistrationStatus, ResetType};
use super::ids::{IdToken, TransactionId, VendorId};
use super::messages::*;
use super::session::{CallError, WsSession};

/// Client-side view of one connected peer.
pub struct OcppClient {
    session: Arc<WsSession>,
    heartbeat_interval: Arc<RwLock<Option<Duration>>>,
    last_heartbeat: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl OcppClient {
    pub fn new(session: Arc<WsSession>) -> Self {
        Self {
            session,
            heartbeat_interval: Arc::new(RwLock::new(None)),
            last_heartbeat: Arc::new(RwLock::new(None)),
        }
    }

    pub fn session(&self) -> &Arc<WsSession> {
        &self.session
    }

    /// Announces the charge point. An accepted registration stores the heartbeat interval.
    pub async fn send_boot_notification(
        &self,
        request: BootNotificationRequest,
    ) -> Result<BootNotificationResponse, CallError> {
        let response = self.session.call::<BootNotification>(&request).await?;
        if response.status == RegistrationStatus::Accepted {
            *self.heartbeat_interval.write().await = Some(Duration::from_secs(u64::from(response.interval)));
        }
        tracing::info!(
            charge_box_id = %self.session.charge_box_id(),
            status = %response.status,
            interval = response.interval,
            "boot notification answered"
        );
        Ok(response)
    }

    pub async fn send_heartbeat(&self) -> Result<HeartbeatResponse, CallError> {
        let response = self.session.call::<Heartbeat>(&HeartbeatRequest).await?;
        *self.last_heartbeat.write().await = Some(response.current_time);
        Ok(response)
    }

    pub async fn reserve_now(&self, request: ReserveNowRequest) -> Result<ReserveNowResponse, CallError> {
        self.session.call::<ReserveNow>(&request).await
    }

    pub async fn cancel_reservation(
        &self,
        request: CancelReservationRequest,
    ) -> Result<CancelReservationResponse, CallError> {
        self.session.call::<CancelReservation>(&request).await
    }

    pub async fn remote_start_transaction(
        &self,
        request: RemoteStartTransactionRequest,
    ) -> Result<RemoteStartTransactionResponse, CallError> {
        self.session.call::<RemoteStartTransaction>(&request).await
    }

    pub async fn remote_stop_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<RemoteStopTransactionResponse, CallError> {
        self.session
            .call::<RemoteStopTransaction>(&RemoteStopTransactionRequest { transaction_id })
            .await
    }

    pub async fn data_transfer(
        &self,
        vendor_id: VendorId,
        message_id: Option<String>,
        data: Option<String>,
    ) -> Result<DataTransferResponse, CallError> {
        let request = DataTransferRequest::new(vendor_id, message_id, data).map_err(CallError::InvalidRequest)?;
        self.session.call::<DataTransfer>(&request).await
    }

    pub async fn get_local_list_version(&self) -> Result<GetLocalListVersionResponse, CallError> {
        self.session.call::<GetLocalListVersion>(&GetLocalListVersionRequest).await
    }

    pub async fn reset(&self, kind: ResetType) -> Result<ResetResponse, CallError> {
        self.session.call::<Reset>(&ResetRequest { kind }).await
    }

    pub async fn change_configuration(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<ChangeConfigurationResponse, CallError> {
        let request = ChangeConfigurationRequest::new(key, value).map_err(CallError::InvalidRequest)?;
        self.session.call::<ChangeConfiguration>(&request).await
    }

    /// Remote start with just an id tag on any connector.
    pub async fn remote_start_for(&self, id_tag: IdToken) -> Result<RemoteStartTransactionResponse, CallError> {
        let request = RemoteStartTransactionRequest::new(id_tag, None, None).map_err(CallError::InvalidRequest)?;
        self.remote_start_transaction(request).await
    }

    /// Interval from the last accepted boot notification.
    pub async fn heartbeat_interval(&self) -> Option<Duration> {
        *self.heartbeat_interval.read().await
    }

    /// Central system time reported by the last heartbeat.
    pub async fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        *self.last_heartbeat.read().await
    }
}
