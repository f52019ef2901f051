//! Backgrounding coordinator
//!
//! Decides whether the display surface keeps its player reference when the
//! host application moves to the background. Attachment is independent of
//! transport: a detached player may keep decoding for background audio.

use tracing::debug;

use crate::types::Attachment;

/// What to do with the display surface's player reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    /// Reference the current player (if any)
    Bind,
    /// Drop the player reference
    Unbind,
    /// Leave the surface as is
    Keep,
}

/// Tracks attachment of the player to the display surface
#[derive(Debug, Clone, Default)]
pub struct BackgroundCoordinator {
    attachment: Attachment,
    in_background: bool,
}

impl BackgroundCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    pub fn is_in_background(&self) -> bool {
        self.in_background
    }

    /// Whether a freshly built player should be bound to the surface
    pub fn binds_new_players(&self) -> bool {
        self.attachment == Attachment::Attached
    }

    /// Host entered the background
    pub fn on_backgrounded(&mut self, picture_in_picture: bool) -> SurfaceAction {
        self.in_background = true;

        if picture_in_picture {
            debug!("Keeping display attached for picture-in-picture");
            return SurfaceAction::Keep;
        }

        match self.attachment {
            Attachment::Detached => SurfaceAction::Keep,
            Attachment::Attached => {
                self.attachment = Attachment::Detached;
                SurfaceAction::Unbind
            }
        }
    }

    /// Host is about to enter the foreground. The current player is always
    /// referenced again; the caller skips the bind when it is already bound.
    pub fn on_foregrounded(&mut self) -> SurfaceAction {
        self.in_background = false;
        self.attachment = Attachment::Attached;
        SurfaceAction::Bind
    }
}
