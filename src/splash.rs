//! Framebuffer splash screens.
//!
//! Splash output is strictly best-effort: a missing display, a broken renderer
//! or an absent image must never hold up the boot sequence. Callers go through
//! [`present_best_effort`], which logs and swallows every failure.
use std::{fs, path::Path};

use tracing::{debug, warn};

use crate::{
    config::SplashSettings, constants::COLLABORATOR_TIMEOUT, error::CollaboratorError,
    shell::run_program,
};

/// Base image a message is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Boot,
    Error,
    Configuring,
    Wait,
}

impl Background {
    fn image<'a>(&self, settings: &'a SplashSettings) -> &'a Path {
        match self {
            Background::Boot => &settings.boot_image,
            Background::Error => &settings.error_image,
            Background::Configuring => &settings.configuring_image,
            Background::Wait => &settings.wait_image,
        }
    }
}

/// Text drawn on a splash: free text, host address and fault label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplashMessage {
    pub text: Option<String>,
    pub address: Option<String>,
    pub error_label: Option<String>,
    pub background: Background,
}

impl SplashMessage {
    /// Plain informational message on the boot image.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            address: None,
            error_label: None,
            background: Background::Boot,
        }
    }

    /// Diagnostic pairing the host address with a fault label.
    pub fn fault(address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: None,
            address: Some(address.into()),
            error_label: Some(label.into()),
            background: Background::Error,
        }
    }

    pub fn on(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Lines in display order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(text) = &self.text {
            lines.push(text.clone());
        }
        if let Some(address) = &self.address {
            lines.push(format!("IP: {address}"));
        }
        if let Some(label) = &self.error_label {
            lines.push(format!("Error: {label}"));
        }
        lines
    }
}

/// What to put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplashRequest {
    /// The boot logo.
    Boot,
    /// The most recently rendered message, or the boot logo if none exists.
    Last,
    /// A stock image from the splash settings.
    Image(Background),
    /// Render and show a message.
    Message(SplashMessage),
}

/// Puts images on the console display.
pub trait SplashPresenter {
    fn present(
        &self,
        request: &SplashRequest,
        settings: &SplashSettings,
    ) -> Result<(), CollaboratorError>;
}

/// Presents `request`, logging instead of returning any failure.
pub fn present_best_effort(
    presenter: &dyn SplashPresenter,
    request: &SplashRequest,
    settings: &SplashSettings,
) {
    if let Err(err) = presenter.present(request, settings) {
        warn!("Splash presentation failed ({:?}): {}", request, err);
    }
}

/// Renders with ImageMagick and displays with an image viewer on the root window.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramebufferSplash;

impl FramebufferSplash {
    fn display(&self, image: &Path, settings: &SplashSettings) -> Result<(), CollaboratorError> {
        if !image.exists() {
            return Err(CollaboratorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("splash image {} not found", image.display()),
            )));
        }
        let image = image.to_string_lossy().into_owned();
        run_program(
            &settings.display_program,
            &["-fullscreen", "-onroot", image.as_str()],
            None,
            COLLABORATOR_TIMEOUT,
        )?;
        Ok(())
    }

    fn render(
        &self,
        message: &SplashMessage,
        settings: &SplashSettings,
    ) -> Result<(), CollaboratorError> {
        if let Some(dir) = settings.message_image.parent() {
            fs::create_dir_all(dir)?;
        }
        let base = message.background.image(settings).to_string_lossy().into_owned();
        let target = settings.message_image.to_string_lossy().into_owned();
        let text = message.lines().join("\n");
        let point_size = settings.point_size.to_string();

        let args = [
            base.as_str(),
            "-strip",
            "-gravity",
            "south",
            "-fill",
            "white",
            "-font",
            settings.font.as_str(),
            "-pointsize",
            point_size.as_str(),
            "-annotate",
            "+0+40",
            text.as_str(),
            target.as_str(),
        ];
        run_program(&settings.render_program, &args, None, COLLABORATOR_TIMEOUT)?;
        Ok(())
    }
}

impl SplashPresenter for FramebufferSplash {
    fn present(
        &self,
        request: &SplashRequest,
        settings: &SplashSettings,
    ) -> Result<(), CollaboratorError> {
        if !settings.enabled {
            debug!("Splash disabled; skipping {:?}", request);
            return Ok(());
        }

        match request {
            SplashRequest::Boot => self.display(&settings.boot_image, settings),
            SplashRequest::Image(background) => {
                self.display(background.image(settings), settings)
            }
            SplashRequest::Last => {
                if settings.message_image.exists() {
                    self.display(&settings.message_image, settings)
                } else {
                    self.display(&settings.boot_image, settings)
                }
            }
            SplashRequest::Message(message) => {
                debug!("Rendering splash message: {:?}", message.lines());
                match self.render(message, settings) {
                    Ok(()) => self.display(&settings.message_image, settings),
                    Err(err) => {
                        warn!("Failed to render splash message: {}", err);
                        self.display(message.background.image(settings), settings)
                    }
                }
            }
        }
    }
}
