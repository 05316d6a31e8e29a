//! Remote catalog access.
//!
//! `RemoteCatalog` is the seam between the sync executor and the store's
//! admin API; `RestRemoteCatalog` is the production implementation over the
//! REST admin interface. Tests substitute an in-memory implementation.

use std::env;

use base64::Engine as _;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::naming;

/// An image as the remote reports it. The filename is derived from the
/// last path segment of the CDN src and may carry a remote-added id suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub id: u64,
    pub filename: String,
    pub src: String,
}

/// A purchasable variant, used to attach SKU images to the right variant.
#[derive(Debug, Clone)]
pub struct RemoteVariant {
    pub id: u64,
    pub sku: String,
}

/// A product with everything the mirror pass needs to rebuild its local
/// directory: naming inputs plus the attached images and variants.
#[derive(Debug, Clone)]
pub struct RemoteProduct {
    pub id: u64,
    pub title: String,
    pub vendor: String,
    pub images: Vec<RemoteImage>,
    pub variants: Vec<RemoteVariant>,
}

/// Optional attributes attached to an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOpts {
    pub filename: String,
    pub variant_ids: Vec<u64>,
    pub position: Option<u32>,
    pub alt_text: Option<String>,
}

/// Operations the sync executor needs from the remote store.
pub trait RemoteCatalog: Send + Sync {
    /// All images currently attached to the product.
    fn list_images(&self, product_id: u64) -> Result<Vec<RemoteImage>>;

    /// Delete one image. Deleting an image that is already gone must
    /// succeed, so retries and races stay harmless.
    fn delete_image(&self, product_id: u64, image_id: u64) -> Result<()>;

    /// Upload image bytes with the given attributes.
    fn upload_image(&self, product_id: u64, bytes: &[u8], opts: &UploadOpts) -> Result<()>;

    /// Read a product metadata field, `None` when unset.
    fn get_metadata_field(&self, product_id: u64, namespace: &str, key: &str)
        -> Result<Option<String>>;

    /// Create or update a product metadata field.
    fn set_metadata_field(
        &self,
        product_id: u64,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Variants whose SKU matches, compared case-insensitively.
    fn find_variants_by_sku(&self, product_id: u64, sku: &str) -> Result<Vec<RemoteVariant>>;

    /// Every product in the store. Errors once the store outgrows a single
    /// page so a silent partial mirror cannot happen.
    fn list_products(&self) -> Result<Vec<RemoteProduct>>;

    /// Download the raw bytes behind an image src URL.
    fn fetch_image(&self, src: &str) -> Result<Vec<u8>>;
}

/// Largest page the admin API serves in one request.
const PRODUCTS_PAGE_LIMIT: usize = 250;

/// REST admin API client, authenticated with basic auth.
pub struct RestRemoteCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
    key: String,
    token: String,
}

impl RestRemoteCatalog {
    /// Build a client from `SHOPIFY_SHOP`, `SHOPIFY_KEY` and `SHOPIFY_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let shop = require_env("SHOPIFY_SHOP")?;
        let key = require_env("SHOPIFY_KEY")?;
        let token = require_env("SHOPIFY_TOKEN")?;

        Ok(RestRemoteCatalog {
            client: reqwest::blocking::Client::new(),
            base_url: format!("https://{}.myshopify.com/admin", shop),
            key,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(self.url(path))
            .basic_auth(&self.key, Some(&self.token))
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Configuration(format!("{} is not set", name)))
}

#[derive(Deserialize)]
struct ProductsEnvelope {
    products: Vec<ProductDto>,
}

#[derive(Deserialize)]
struct ProductDto {
    id: u64,
    title: String,
    vendor: String,
    #[serde(default)]
    images: Vec<ImageDto>,
    #[serde(default)]
    variants: Vec<VariantDto>,
}

#[derive(Deserialize)]
struct ImagesEnvelope {
    images: Vec<ImageDto>,
}

#[derive(Deserialize)]
struct ImageDto {
    id: u64,
    src: String,
}

#[derive(Deserialize)]
struct VariantsEnvelope {
    variants: Vec<VariantDto>,
}

#[derive(Deserialize)]
struct VariantDto {
    id: u64,
    sku: Option<String>,
}

#[derive(Deserialize)]
struct MetafieldsEnvelope {
    metafields: Vec<MetafieldDto>,
}

#[derive(Deserialize)]
struct MetafieldDto {
    id: u64,
    namespace: String,
    key: String,
    value: String,
}

impl RestRemoteCatalog {
    fn find_metafield(
        &self,
        product_id: u64,
        namespace: &str,
        key: &str,
    ) -> Result<Option<MetafieldDto>> {
        let envelope: MetafieldsEnvelope = self
            .get(&format!("products/{}/metafields.json", product_id))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(envelope
            .metafields
            .into_iter()
            .find(|m| m.namespace == namespace && m.key == key))
    }
}

impl RemoteCatalog for RestRemoteCatalog {
    fn list_images(&self, product_id: u64) -> Result<Vec<RemoteImage>> {
        let envelope: ImagesEnvelope = self
            .get(&format!("products/{}/images.json", product_id))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(envelope
            .images
            .into_iter()
            .map(|img| RemoteImage {
                id: img.id,
                filename: naming::remote_filename(&img.src),
                src: img.src,
            })
            .collect())
    }

    fn delete_image(&self, product_id: u64, image_id: u64) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("products/{}/images/{}.json", product_id, image_id)))
            .basic_auth(&self.key, Some(&self.token))
            .send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Image {} was already gone from product {}", image_id, product_id);
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }

    fn upload_image(&self, product_id: u64, bytes: &[u8], opts: &UploadOpts) -> Result<()> {
        let mut image = json!({
            "attachment": base64::engine::general_purpose::STANDARD.encode(bytes),
            "filename": opts.filename,
        });
        if !opts.variant_ids.is_empty() {
            image["variant_ids"] = json!(opts.variant_ids);
        }
        if let Some(position) = opts.position {
            image["position"] = json!(position);
        }
        if let Some(alt) = &opts.alt_text {
            image["alt"] = json!(alt);
        }

        self.client
            .post(self.url(&format!("products/{}/images.json", product_id)))
            .basic_auth(&self.key, Some(&self.token))
            .json(&json!({ "image": image }))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get_metadata_field(
        &self,
        product_id: u64,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .find_metafield(product_id, namespace, key)?
            .map(|m| m.value))
    }

    fn set_metadata_field(
        &self,
        product_id: u64,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let existing = self.find_metafield(product_id, namespace, key)?;

        let response = match existing {
            Some(metafield) => self
                .client
                .put(self.url(&format!("metafields/{}.json", metafield.id)))
                .basic_auth(&self.key, Some(&self.token))
                .json(&json!({
                    "metafield": {
                        "id": metafield.id,
                        "value": value,
                        "type": "single_line_text_field",
                    }
                }))
                .send()?,
            None => self
                .client
                .post(self.url(&format!("products/{}/metafields.json", product_id)))
                .basic_auth(&self.key, Some(&self.token))
                .json(&json!({
                    "metafield": {
                        "namespace": namespace,
                        "key": key,
                        "value": value,
                        "type": "single_line_text_field",
                    }
                }))
                .send()?,
        };
        response.error_for_status()?;
        Ok(())
    }

    fn find_variants_by_sku(&self, product_id: u64, sku: &str) -> Result<Vec<RemoteVariant>> {
        let envelope: VariantsEnvelope = self
            .get(&format!("products/{}/variants.json", product_id))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(envelope
            .variants
            .into_iter()
            .filter_map(|v| {
                let variant_sku = v.sku?;
                variant_sku
                    .eq_ignore_ascii_case(sku)
                    .then_some(RemoteVariant {
                        id: v.id,
                        sku: variant_sku,
                    })
            })
            .collect())
    }

    fn list_products(&self) -> Result<Vec<RemoteProduct>> {
        let envelope: ProductsEnvelope = self
            .get(&format!("products.json?limit={}", PRODUCTS_PAGE_LIMIT))
            .send()?
            .error_for_status()?
            .json()?;

        if envelope.products.len() == PRODUCTS_PAGE_LIMIT {
            return Err(Error::Sync(format!(
                "store has {} or more products; paginated listing is not implemented",
                PRODUCTS_PAGE_LIMIT
            )));
        }

        Ok(envelope
            .products
            .into_iter()
            .map(|p| RemoteProduct {
                id: p.id,
                title: p.title,
                vendor: p.vendor,
                images: p
                    .images
                    .into_iter()
                    .map(|img| RemoteImage {
                        id: img.id,
                        filename: naming::remote_filename(&img.src),
                        src: img.src,
                    })
                    .collect(),
                variants: p
                    .variants
                    .into_iter()
                    .filter_map(|v| {
                        v.sku.map(|sku| RemoteVariant { id: v.id, sku })
                    })
                    .collect(),
            })
            .collect())
    }

    fn fetch_image(&self, src: &str) -> Result<Vec<u8>> {
        // CDN URLs are public and pre-signed; no auth header wanted
        Ok(self
            .client
            .get(src)
            .send()?
            .error_for_status()?
            .bytes()?
            .to_vec())
    }
}
