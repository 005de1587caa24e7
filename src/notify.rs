//! Outbound notifications.
//!
//! The service emits a [`PoolEvent`] after a state change has been stored.
//! Delivery happens on a [`NotificationWorker`] actor; nothing it does can
//! fail or roll back the change that produced the event.

use actix::{Actor, Addr, Context, Handler, Message};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::schemas::UserId;

#[derive(Clone, Debug, PartialEq, Serialize, Message)]
#[rtype(result = "()")]
pub enum PoolEvent {
    MemberAdded {
        pool_name: String,
        invited_by: UserId,
        user_id: UserId,
        email: Option<String>,
    },
    /// Invitation to someone who may not have an account yet.
    PoolInvite {
        pool_name: String,
        description: String,
        invited_by: UserId,
        email: String,
    },
    ExpenseAdded {
        pool_name: String,
        title: String,
        amount: Decimal,
        paid_by: UserId,
        recipients: Vec<String>,
    },
    TransactionSettled {
        pool_name: String,
        from_user: UserId,
        to_user: UserId,
        amount: Decimal,
        from_email: Option<String>,
        to_email: Option<String>,
    },
}

/// Fire-and-forget sink for [`PoolEvent`]s.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, event: PoolEvent);
}

impl Notifier for Addr<NotificationWorker> {
    fn dispatch(&self, event: PoolEvent) {
        self.do_send(event);
    }
}

/// Drops every event. For deployments without outbound mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn dispatch(&self, _event: PoolEvent) {}
}

/// Keeps dispatched events in memory.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: std::sync::Arc<std::sync::Mutex<Vec<PoolEvent>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingNotifier {
    pub fn events(&self) -> Vec<PoolEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Notifier for RecordingNotifier {
    fn dispatch(&self, event: PoolEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send {
    fn send(&mut self, notification: &Notification) -> Result<(), String>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&mut self, notification: &Notification) -> Result<(), String> {
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            "notification"
        );
        Ok(())
    }
}

pub fn render(event: &PoolEvent) -> Vec<Notification> {
    match event {
        PoolEvent::MemberAdded {
            pool_name,
            invited_by,
            email,
            ..
        } => email
            .iter()
            .map(|to| Notification {
                to: to.clone(),
                subject: format!("You've been added to \"{pool_name}\""),
                body: format!(
                    "{invited_by} added you to the expense pool \"{pool_name}\". \
                     Log in to see its expenses and balances."
                ),
            })
            .collect(),
        PoolEvent::PoolInvite {
            pool_name,
            description,
            invited_by,
            email,
        } => {
            let mut body = format!("{invited_by} has invited you to join the expense pool \"{pool_name}\".");
            if !description.is_empty() {
                body.push_str(&format!("\n\nPool description: {description}"));
            }
            body.push_str("\n\nSign up to join the pool and see its expenses.");
            vec![Notification {
                to: email.clone(),
                subject: format!("Invitation to join \"{pool_name}\""),
                body,
            }]
        }
        PoolEvent::ExpenseAdded {
            pool_name,
            title,
            amount,
            paid_by,
            recipients,
        } => recipients
            .iter()
            .map(|to| Notification {
                to: to.clone(),
                subject: format!("New expense in \"{pool_name}\": {title}"),
                body: format!("{paid_by} paid ₹{amount} for \"{title}\" in \"{pool_name}\"."),
            })
            .collect(),
        PoolEvent::TransactionSettled {
            pool_name,
            from_user,
            to_user,
            amount,
            from_email,
            to_email,
        } => {
            let mut notifications = Vec::new();
            if let Some(to) = from_email {
                notifications.push(Notification {
                    to: to.clone(),
                    subject: format!("Payment to {to_user} confirmed"),
                    body: format!(
                        "{to_user} confirmed receiving ₹{amount} from you in \"{pool_name}\"."
                    ),
                });
            }
            if let Some(to) = to_email {
                notifications.push(Notification {
                    to: to.clone(),
                    subject: format!("You confirmed a payment from {from_user}"),
                    body: format!(
                        "You marked ₹{amount} from {from_user} in \"{pool_name}\" as settled."
                    ),
                });
            }
            notifications
        }
    }
}

pub struct NotificationWorker {
    mailer: Box<dyn Mailer>,
}

impl NotificationWorker {
    pub fn new(mailer: Box<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl Actor for NotificationWorker {
    type Context = Context<Self>;
}

impl Handler<PoolEvent> for NotificationWorker {
    type Result = ();

    fn handle(&mut self, event: PoolEvent, _ctx: &mut Context<Self>) {
        for notification in render(&event) {
            if let Err(e) = self.mailer.send(&notification) {
                tracing::warn!(to = %notification.to, "failed to deliver notification: {}", e);
            }
        }
    }
}
