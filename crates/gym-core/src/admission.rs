//! Facility admission: who may pass the building entrance.
//!
//! A captured frame is reduced to exactly one face, matched against the
//! gallery, and then either logged as a member movement, admitted as a guest
//! under an escorting member, or refused.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  AccessControl, Error, Result,
  directory::{Candidate, IdentityDirectory},
  member::{Member, MemberId},
  session::{Direction, FacilitySession},
  store::{AccessStore, FacilityEntry, GuestEntry},
};

/// Input to [`AccessControl::decide_admission`].
#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
  pub image:            Vec<u8>,
  pub direction:        Option<Direction>,
  /// The person at the gate claims to be an escorted guest.
  pub is_guest:         bool,
  pub escort_member_id: Option<MemberId>,
}

/// A positive admission decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Admission {
  Member {
    member:     Member,
    direction:  Direction,
    confidence: f32,
    session:    FacilitySession,
  },
  Guest {
    escort:                Member,
    /// Identifies the guest for room movements and their exit.
    pass_id:               Uuid,
    remaining_invitations: u32,
  },
}

impl<S, D> AccessControl<S, D>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  /// Decide whether the person in `request.image` may cross the facility
  /// boundary in `request.direction`.
  ///
  /// Writes exactly one facility session change on success (plus one
  /// invitation decrement for guests) and nothing on any failure.
  pub async fn decide_admission(
    &self,
    request: AdmissionRequest,
  ) -> Result<Admission> {
    if request.image.is_empty() {
      return Err(Error::InvalidInput("image is required".into()));
    }
    let direction = request
      .direction
      .ok_or_else(|| Error::InvalidInput("direction is required".into()))?;

    let face = self.detect_single_face(&request.image).await?;

    let threshold = self.policy.confidence_threshold;
    let candidate = self
      .directory
      .identify(&face, threshold)
      .await
      .map_err(Error::identity_service)?
      .filter(|c| c.confidence >= threshold);

    if let Some(candidate) = candidate {
      return self.admit_member(candidate, direction).await;
    }

    if request.is_guest && direction == Direction::Enter {
      return self.admit_guest(request.escort_member_id).await;
    }

    warn!(%direction, is_guest = request.is_guest, "person not recognized");
    Err(Error::PersonNotRecognized)
  }

  async fn admit_member(
    &self,
    candidate: Candidate,
    direction: Direction,
  ) -> Result<Admission> {
    let member = self
      .store
      .find_active_member_by_identity(&candidate.identity)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::MemberNotFound(format!(
          "no active member for identity {}",
          candidate.identity
        ))
      })?;
    let member_id = member.member_id;

    let session = match direction {
      Direction::Enter => {
        match self
          .store
          .open_member_session(member_id)
          .await
          .map_err(Error::store)?
        {
          FacilityEntry::Opened(session) => session,
          FacilityEntry::AlreadyOpen(session) => {
            return Err(Error::SessionStateConflict(format!(
              "member {member_id} has been inside since {}",
              session.opened_at
            )));
          }
        }
      }
      Direction::Exit => self
        .store
        .close_member_session(member_id)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| {
          Error::SessionStateConflict(format!(
            "member {member_id} is not inside"
          ))
        })?,
    };

    info!(
      member_id,
      %direction,
      confidence = candidate.confidence,
      "member admitted"
    );
    Ok(Admission::Member {
      member,
      direction,
      confidence: candidate.confidence,
      session,
    })
  }

  async fn admit_guest(&self, escort_id: Option<MemberId>) -> Result<Admission> {
    let escort_id = escort_id.ok_or(Error::EscortRequired)?;

    match self.store.admit_guest(escort_id).await.map_err(Error::store)? {
      GuestEntry::Admitted { session, escort } => {
        info!(
          escort_id,
          pass_id = %session.session_id,
          remaining = escort.guest_invitations,
          "guest admitted"
        );
        Ok(Admission::Guest {
          pass_id:               session.session_id,
          remaining_invitations: escort.guest_invitations,
          escort,
        })
      }
      GuestEntry::EscortNotFound => {
        Err(Error::MemberNotFound(format!("escort member {escort_id}")))
      }
      GuestEntry::NoInvitationsLeft => Err(Error::NoInvitationsLeft(escort_id)),
    }
  }

  /// Record a guest leaving the building.
  pub async fn close_guest_session(&self, pass_id: Uuid) -> Result<FacilitySession> {
    let session = self
      .store
      .close_guest_session(pass_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NoOpenSession(format!("no guest inside with pass {pass_id}"))
      })?;
    info!(%pass_id, "guest left");
    Ok(session)
  }
}
