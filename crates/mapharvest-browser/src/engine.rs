use crate::actions::{PageHandle, PageRenderer, SessionLauncher};
use crate::error::{BrowserError, Result};
use chromiumoxide::auth::Credentials;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use mapharvest_core::{BrowserSettings, EgressCredential};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Poll interval for selector waits.
const POLL_INTERVAL_MS: u64 = 100;

/// Browser automation engine bound to one egress credential.
pub struct BrowserEngine {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    credential: Option<EgressCredential>,
}

impl BrowserEngine {
    /// Launch a browser with direct network access.
    pub async fn new(settings: &BrowserSettings) -> Result<Self> {
        Self::launch(settings, None).await
    }

    /// Launch a browser routed through `credential`.
    pub async fn with_proxy(settings: &BrowserSettings, credential: &EgressCredential) -> Result<Self> {
        Self::launch(settings, Some(credential)).await
    }

    async fn launch(settings: &BrowserSettings, credential: Option<&EgressCredential>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .viewport(Viewport {
                width: settings.window_width,
                height: settings.window_height,
                ..Viewport::default()
            })
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.block_heavy_resources {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }
        if let Some(credential) = credential {
            builder = builder.arg(format!("--proxy-server={}", credential.server_url()));
        }

        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);

        // Drive CDP events until the connection drops
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromium handler event error: {}", e);
                }
            }
            closed_flag.store(true, Ordering::SeqCst);
        });

        tracing::debug!(
            proxy = credential.map(ToString::to_string).unwrap_or_default(),
            headless = settings.headless,
            "browser launched"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            closed,
            credential: credential.cloned(),
        })
    }
}

#[async_trait::async_trait]
impl PageRenderer for BrowserEngine {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>> {
        if !self.is_alive() {
            return Err(BrowserError::SessionClosed);
        }

        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| chromium_error(&self.closed, e))?;

        if let Some(credential) = &self.credential {
            page.authenticate(Credentials {
                username: credential.username().to_string(),
                password: credential.password().to_string(),
            })
            .await
            .map_err(|e| chromium_error(&self.closed, e))?;
        }

        Ok(Box::new(ChromePage {
            page,
            closed: Arc::clone(&self.closed),
        }))
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if self.is_alive() {
            if let Err(e) = browser.close().await {
                tracing::debug!("browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A tab opened by [`BrowserEngine`].
pub struct ChromePage {
    page: Page,
    closed: Arc<AtomicBool>,
}

impl ChromePage {
    async fn query(&self, script: String) -> Result<Option<String>> {
        let value = self.evaluate(&script).await?;
        Ok(value.as_str().map(ToString::to_string))
    }
}

#[async_trait::async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(match chromium_error(&self.closed, e) {
                BrowserError::ChromiumError(msg) => BrowserError::NavigationError(msg),
                other => other,
            }),
            Err(_) => Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector).map_err(|e| BrowserError::Script(e.to_string()))?
        );
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.evaluate(&script).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("waiting for {selector}")));
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let selector =
            serde_json::to_string(selector).map_err(|e| BrowserError::Script(e.to_string()))?;
        self.query(format!(
            "(() => {{ const el = document.querySelector({selector}); return el ? (el.innerText || el.textContent) : null; }})()"
        ))
        .await
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let selector =
            serde_json::to_string(selector).map_err(|e| BrowserError::Script(e.to_string()))?;
        let name = serde_json::to_string(name).map_err(|e| BrowserError::Script(e.to_string()))?;
        self.query(format!(
            "(() => {{ const el = document.querySelector({selector}); return el ? el.getAttribute({name}) : null; }})()"
        ))
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| match chromium_error(&self.closed, e) {
                BrowserError::ChromiumError(msg) => BrowserError::Script(msg),
                other => other,
            })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| chromium_error(&self.closed, e))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| chromium_error(&self.closed, e))
    }
}

/// Launches one [`BrowserEngine`] per credential.
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, credential: &EgressCredential) -> Result<Box<dyn PageRenderer>> {
        let engine = BrowserEngine::with_proxy(&self.settings, credential).await?;
        Ok(Box::new(engine))
    }
}

fn chromium_error(closed: &AtomicBool, error: chromiumoxide::error::CdpError) -> BrowserError {
    if closed.load(Ordering::SeqCst) {
        BrowserError::SessionClosed
    } else {
        BrowserError::ChromiumError(error.to_string())
    }
}
