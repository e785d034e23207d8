//! Window hosting the frontend.
//!
//! With the `desktop` feature a native window with an embedded web view is
//! opened on the main thread. Otherwise the default browser is pointed at
//! the server and the process stays up until Ctrl+C.

use tokio::runtime::Handle;

pub const WINDOW_TITLE: &str = "MarkFlow";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[cfg(feature = "desktop")]
    #[error("failed to create window")]
    Window(#[from] tao::error::OsError),
    #[cfg(feature = "desktop")]
    #[error("failed to create web view")]
    WebView(#[from] wry::Error),
    #[error("failed to wait for Ctrl+C")]
    Signal(#[source] std::io::Error),
}

/// Where the frontend is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Native window (`desktop` feature).
    Window,
    /// The system's default browser.
    Browser,
    /// Nothing; the server runs until interrupted.
    Headless,
}

impl Surface {
    pub const fn select(no_window: bool) -> Self {
        if no_window {
            Self::Headless
        } else if cfg!(feature = "desktop") {
            Self::Window
        } else {
            Self::Browser
        }
    }
}

/// Show `url` on `surface` and block until the user is done with it.
///
/// Must run on the main thread; `runtime` is used for signal handling.
pub fn run(url: &str, surface: Surface, runtime: &Handle) -> Result<(), ShellError> {
    match surface {
        #[cfg(feature = "desktop")]
        Surface::Window => desktop::run_window(url, runtime),
        #[cfg(not(feature = "desktop"))]
        Surface::Window => {
            open_browser(url);
            wait_for_interrupt(runtime)
        }
        Surface::Browser => {
            open_browser(url);
            wait_for_interrupt(runtime)
        }
        Surface::Headless => {
            println!("MarkFlow is running at {url} (Ctrl+C to quit)");
            wait_for_interrupt(runtime)
        }
    }
}

/// Point the default browser at `url`, falling back to printing it.
pub fn open_browser(url: &str) {
    if let Err(err) = open::that(url) {
        tracing::warn!(%err, "failed to open browser");
        println!("Open {url} in your browser");
    }
}

fn wait_for_interrupt(runtime: &Handle) -> Result<(), ShellError> {
    runtime
        .block_on(tokio::signal::ctrl_c())
        .map_err(ShellError::Signal)?;
    tracing::info!("received Ctrl+C, shutting down");
    Ok(())
}

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use tao::dpi::LogicalSize;
    use tao::event::{Event, WindowEvent};
    use tao::event_loop::{ControlFlow, EventLoop};
    use tao::platform::run_return::EventLoopExtRunReturn;
    use tao::window::WindowBuilder;
    use tokio::runtime::Handle;
    use wry::WebViewBuilder;

    use super::{ShellError, WINDOW_TITLE};

    const SIGNAL_POLL: Duration = Duration::from_millis(200);

    pub fn run_window(url: &str, runtime: &Handle) -> Result<(), ShellError> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received Ctrl+C, closing window");
                flag.store(true, Ordering::SeqCst);
            }
        });

        // Must be on the main thread for macOS
        let mut event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1200.0, 800.0))
            .with_min_inner_size(LogicalSize::new(800.0, 600.0))
            .build(&event_loop)?;
        let _webview = WebViewBuilder::new().with_url(url).build(&window)?;
        tracing::info!(%url, "window opened");

        event_loop.run_return(move |event, _, control_flow| {
            if interrupted.load(Ordering::SeqCst) {
                *control_flow = ControlFlow::Exit;
                return;
            }
            *control_flow = ControlFlow::WaitUntil(Instant::now() + SIGNAL_POLL);

            if let Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } = event
            {
                *control_flow = ControlFlow::Exit;
            }
        });
        Ok(())
    }
}
