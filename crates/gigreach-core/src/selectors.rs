//! Selector fallback chains for the target site's DOM variants.
//!
//! The site ships multiple markup generations at once, so every extraction
//! point is an ordered list of candidate selectors tried in order, first
//! match wins. Kept as data so a new variant is a one-line addition.

/// Search-result rows (new layout first, legacy second).
pub const RESULT_ROWS: [&str; 2] = ["div.result-info", "div.cl-search-result"];

/// Title anchor inside a result row.
pub const TITLE_ANCHORS: [&str; 2] = [
    "a.cl-app-anchor.cl-search-anchor.posting-title",
    "a.posting-title",
];

/// Nested label used when the anchor's own text is empty.
pub const TITLE_LABEL: &str = "span.label";

/// Posting-date element inside a result row.
pub const POST_DATES: [&str; 3] = ["span[title]", "time.posted-date", "time.result-date"];

/// Description region on a detail page.
pub const DESCRIPTION_REGIONS: [&str; 3] = [
    "#postingbody",
    "section#postingbody",
    "div[data-testid='postingbody']",
];

/// Single selector matching any description-region variant; used as the
/// detail-page load signal.
pub const DESCRIPTION_REGION_ANY: &str =
    "#postingbody, section#postingbody, div[data-testid='postingbody']";

/// The "reply" control that opens the contact panel.
pub const REPLY_BUTTONS: [&str; 4] = [
    "button.reply-button",
    "button[data-href*='/reply/']",
    "a.reply-button",
    "a[href*='/reply/']",
];

/// The control inside the contact panel that reveals the email address.
pub const REVEAL_BUTTONS: [&str; 3] = [
    "button.reply-option-header",
    "button[class*='reply-email']",
    "div[class*='reply-email']",
];

/// Container holding the revealed address and webmail links.
pub const EMAIL_CONTAINERS: [&str; 3] = [
    "div.reply-content-email",
    "div[class*='reply-email']",
    "div.reply-info",
];

/// Anchor carrying the address itself.
pub const EMAIL_ANCHORS: [&str; 3] = [
    "div.reply-email-address a",
    "a[href^='mailto:']",
    "a[class*='email']",
];

/// Webmail provider deep links, keyed by class substring.
pub const WEBMAIL_ANCHORS: &str = "a[class*='webmail']";

/// CAPTCHA widgets render into canvases.
pub const CAPTCHA_CANVAS: &str = "canvas";

/// Hidden response input planted by the CAPTCHA script.
pub const CAPTCHA_INPUT: &str = "input#g-recaptcha-response";

/// CAPTCHA provider iframes.
pub const CAPTCHA_IFRAMES: &str = "iframe[src*='recaptcha'], iframe[src*='captcha']";
