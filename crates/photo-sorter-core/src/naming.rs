//! Deterministic naming and filename decoding.
//!
//! Filenames encode metadata: a leading `!` marks a file selected for
//! publication, a `---upto<N>` marker denotes an alternate crop sharing its
//! sibling's publish index, and a trailing number before the extension is the
//! position index. All of the regexes involved live in this module.

use std::cmp::Ordering;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ProductContext;

/// Fixed tail of every live filename.
pub const NAME_BASE: &str = "panda-bamboo";

/// Alternate-crop marker embedded in filenames.
pub static UPTO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"---upto\d+").expect("upto regex"));

static TRAIL_IDX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s](\d+)\.[^.]+$").expect("index regex"));

static SIZE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)-(s|l)$").expect("size regex"));

static MULTI_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{4,}").expect("dash regex"));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"___(.+?)___").expect("token regex"));

static LIVE_IDX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"___(\d+)").expect("live idx regex"));

// The remote system suffixes colliding filenames with a unique id.
static REMOTE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"_[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}(\.[^.]+)$",
    )
    .expect("remote id regex")
});

/// Metadata decoded from a single filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// Leading `!` selection marker
    pub bang: bool,
    /// The literal upto marker, e.g. "---upto1"
    pub upto: Option<String>,
    /// Trailing position index, when one is embedded
    pub index: Option<u32>,
    /// Extension including the dot, e.g. ".jpg"
    pub ext: String,
}

/// Decode the metadata a filename carries.
pub fn decode(entry: &str) -> DecodedName {
    let upto = UPTO_RE.find(entry).map(|m| m.as_str().to_string());
    let stripped = UPTO_RE.replace(entry, "");
    let index = TRAIL_IDX_RE
        .captures(&stripped)
        .and_then(|c| c[1].parse().ok());
    let ext = Path::new(entry)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    DecodedName {
        bang: entry.starts_with('!'),
        upto,
        index,
        ext,
    }
}

/// Remove the upto marker, recovering the name of the paired sibling.
pub fn strip_upto(entry: &str) -> String {
    UPTO_RE.replace(entry, "").into_owned()
}

/// Remove the unique-id suffix the remote system injects into filenames,
/// recovering the canonical name for comparison.
pub fn strip_remote_id(name: &str) -> String {
    REMOTE_ID_RE.replace(name, "$1").into_owned()
}

/// Filename of a remote image URL, without any query string.
pub fn remote_filename(src: &str) -> String {
    src.rsplit('/')
        .next()
        .unwrap_or(src)
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Compute the rename target for `entry` at `index` inside `folder`.
/// Returns the index the next file in the same group should use: upto
/// variants keep their sibling's index and do not consume a slot.
pub fn local_name(entry: &str, folder: &str, index: u32) -> (u32, String) {
    let d = decode(entry);
    let next = if d.upto.is_some() { index } else { index + 1 };

    let name = format!(
        "{}{} {}{}{}",
        if d.bang { "!" } else { "" },
        middle_token(folder, false),
        index,
        d.upto.as_deref().unwrap_or(""),
        d.ext
    );

    (next, collapse(&name))
}

/// Compute the publish-ready filename for `entry` at `index`.
///
/// The role/SKU token sits right after the category base so that the
/// discriminating text lands within the first ~30 characters; the remote
/// system mangles filenames that only differ beyond that point.
pub fn live_name(entry: &str, ctx: &ProductContext, index: u32) -> String {
    let d = decode(entry);
    let token = middle_token(&ctx.sku, true);
    let square = d.bang && token == "editorial";

    let name = [
        category_base(&ctx.category),
        format!("___{}___", token),
        format!("{}{}", index, d.upto.as_deref().unwrap_or("")),
        format!(
            "{}{}{}",
            if square { "square-" } else { "" },
            NAME_BASE,
            d.ext
        ),
    ]
    .join("-");

    collapse(&name)
}

/// Extract the SKU token from a live filename; role tokens yield `None`.
pub fn sku_token(live: &str) -> Option<String> {
    let token = TOKEN_RE.captures(live)?.get(1)?.as_str().to_string();
    match token.as_str() {
        "header" | "editorial" | "product" => None,
        _ => Some(token),
    }
}

/// Position index embedded in a live filename.
pub fn live_index(live: &str) -> Option<u32> {
    LIVE_IDX_RE.captures(live).and_then(|c| c[1].parse().ok())
}

/// Split entries into (uptos, normal), with the normal files sorted by
/// embedded index. Files without a parseable index sort after those with
/// one; ties break lexicographically.
pub fn partition_uptos(entries: Vec<String>) -> (Vec<String>, Vec<String>) {
    let (uptos, mut normal): (Vec<String>, Vec<String>) =
        entries.into_iter().partition(|e| UPTO_RE.is_match(e));

    normal.sort_by(|a, b| match (decode(a).index, decode(b).index) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });

    (uptos, normal)
}

/// Uptos paired with `entry`: same name once the marker is removed.
pub fn matching_uptos<'a>(uptos: &'a [String], entry: &str) -> Vec<&'a String> {
    uptos.iter().filter(|u| strip_upto(u) == entry).collect()
}

fn middle_token(folder: &str, live: bool) -> String {
    if folder.contains("header") {
        "header".to_string()
    } else if folder.contains("editorial") {
        "editorial".to_string()
    } else {
        // Trailing size suffixes (-S/-L) collapse variants of one SKU
        let sku = SIZE_SUFFIX_RE.replace(folder, "").into_owned();
        if live {
            sku.to_lowercase()
        } else {
            sku
        }
    }
}

/// Substrings dropped from remote product titles when deriving folder names.
const UNWANTED_TITLE_PARTS: [&str; 1] = ["the"];

/// Category folder for a remote vendor name; the inverse of the live-name
/// category base.
pub fn category_from_vendor(vendor: &str) -> String {
    let name: String = vendor
        .to_lowercase()
        .replace("panda", "")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match name.as_str() {
        "" => "panda".to_string(),
        "locoporvino" => "watches".to_string(),
        "christmasshop" => "xmas-shop".to_string(),
        _ => name,
    }
}

/// Product folder name mirrored from a remote product title and id.
pub fn product_dir_name(title: &str, id: u64) -> String {
    let mut product = title.to_lowercase();
    for part in UNWANTED_TITLE_PARTS {
        product = product.replace(part, "");
    }
    format!("{} - {}", product.trim(), id)
}

/// SKU folder name for a mirrored variant: size suffix stripped, upper case
/// per the structural convention.
pub fn sku_folder(sku: &str) -> String {
    SIZE_SUFFIX_RE.replace(sku, "").to_uppercase()
}

fn category_base(category: &str) -> String {
    match category {
        "watches" => "locoporvino".to_string(),
        "xmas-shop" => "christmas-shop".to_string(),
        other => format!("panda-{}", slug(other)),
    }
}

fn slug(part: &str) -> String {
    part.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// A divider adjacent to an underscore collapses into the underscore, and
// runs of four or more dashes collapse to the three-dash upto divider.
fn collapse(name: &str) -> String {
    let name = name.replace("_-", "_").replace("-_", "_");
    MULTI_DASH_RE.replace_all(&name, "---").into_owned()
}

// -- Tests --
