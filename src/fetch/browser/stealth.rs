//! Evasion scripts injected into rendered pages.
//!
//! Based on puppeteer-extra-plugin-stealth techniques. Injection is
//! best-effort; failures are logged and ignored.

use chromiumoxide::Page;
use tracing::debug;

const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Fix WebGL vendor/renderer (common detection vector)
    r#"
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(parameter) {
        if (parameter === 37445) {
            return 'Intel Inc.';
        }
        if (parameter === 37446) {
            return 'Intel Iris OpenGL Engine';
        }
        return getParameter.call(this, parameter);
    };
    "#,
];

/// Apply the evasion script set to a live page.
pub(crate) async fn apply_stealth(page: &Page) {
    for script in STEALTH_SCRIPTS {
        if let Err(e) = page.evaluate(script.to_string()).await {
            // Can fail on non-HTML pages or during transitions; not critical.
            debug!("stealth script injection skipped: {}", e);
        }
    }
}
