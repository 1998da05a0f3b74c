//! Notification log service.
//!
//! Covers the two organizer/member-facing operations on the append-only
//! log: ad-hoc broadcast to every member, and a member reading their own
//! history. Meeting-confirmation fan-out lives with the meeting repository
//! so it can share the confirmation transaction.

use crate::model::member::Actor;
use crate::model::notification::Notification;
use crate::model::ValidationError;
use crate::repo::notification_repo::NotificationRepository;
use crate::service::{require_organizer, ServiceError, ServiceResult};
use log::info;

/// Use-case service for the notification log.
pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Queues an ad-hoc message for every member. Organizer only.
    ///
    /// Returns the number of members a record was written for. Delivery is
    /// an external responsibility.
    pub fn broadcast(
        &mut self,
        actor: &Actor,
        subject: Option<&str>,
        body: &str,
    ) -> ServiceResult<usize> {
        require_organizer(actor, "broadcasting a message")?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceError::Validation(ValidationError::new(
                "body",
                "must not be empty",
            )));
        }

        let subject = subject.map(str::trim).filter(|text| !text.is_empty());
        let written = self.repo.broadcast_to_all_members(subject, body)?;
        info!(
            "event=broadcast module=service status=ok actor={} recipients={}",
            actor.member_id, written
        );
        Ok(written)
    }

    /// The acting member's notifications, newest first.
    pub fn notifications_for(
        &self,
        actor: &Actor,
        limit: Option<u32>,
        offset: u32,
    ) -> ServiceResult<Vec<Notification>> {
        Ok(self.repo.list_for_member(actor.member_id, limit, offset)?)
    }
}
