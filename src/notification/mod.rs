use std::sync::Arc;

use rust_decimal::Decimal;

use crate::models::Contract;
use crate::preferences::NotificationSettings;

pub const CHANNEL_ID: &str = "contract_notification_channel";
pub const CHANNEL_NAME: &str = "Contract Notifications";
pub const CONTRACT_CREATED_ID: u32 = 1001;

/// A local notification ready to be handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub id: u32,
	pub channel_id: &'static str,
	/// User-visible name of the channel, shown in the host's notification settings
	pub channel_name: &'static str,
	pub title: String,
	pub body: String,
}

impl Notification {
	pub fn contract_created(contract: &Contract) -> Self {
		Self {
			id: CONTRACT_CREATED_ID,
			channel_id: CHANNEL_ID,
			channel_name: CHANNEL_NAME,
			title: "Contract Created".to_string(),
			body: format!("Contract \"{}\" was created successfully", contract.title),
		}
	}
}

/// Host notification subsystem
pub trait NotificationSink: Send + Sync {
	fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
	#[error("Notification permission not granted")]
	PermissionDenied,
	#[error("Notification subsystem unavailable: {0}")]
	Unavailable(String),
}

/// Sink that writes notifications to the log, used by the command line front end
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
	fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
		tracing::info!(
			id = notification.id,
			channel = notification.channel_id,
			channel_name = notification.channel_name,
			title = %notification.title,
			"{}",
			notification.body
		);
		Ok(())
	}
}

/// Surfaces contract events as local notifications, gated by the user's
/// notification preference. Delivery problems never reach the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
	settings: NotificationSettings,
	sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
	pub fn new(settings: NotificationSettings, sink: Arc<dyn NotificationSink>) -> Self {
		Self { settings, sink }
	}

	pub fn settings(&self) -> &NotificationSettings {
		&self.settings
	}

	pub fn notify_contract_created(&self, contract: &Contract) {
		self.dispatch(contract);
	}

	/// Sends a sample notification through the same gating. Returns whether it
	/// was handed to the host successfully.
	pub fn send_demo_notification(&self) -> bool {
		let mut demo = Contract::new_draft("Demo Notification", Decimal::ZERO);
		demo.description = "This is a demo notification from PactFlow".to_string();
		self.dispatch(&demo)
	}

	fn dispatch(&self, contract: &Contract) -> bool {
		if !self.settings.notifications_enabled() {
			tracing::debug!("Notifications are disabled in settings");
			return false;
		}

		let notification = Notification::contract_created(contract);
		match self.sink.deliver(&notification) {
			Ok(()) => {
				tracing::debug!(contract_id = ?contract.id, "Notification shown");
				true
			}
			Err(e) => {
				tracing::warn!(contract_id = ?contract.id, error = %e, "Error showing notification");
				false
			}
		}
	}
}
