// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Marketplace records (users, stores and products) and the queries run over them.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{within_radius_sorted, Located, Location, RadiusQuery, Ranked, DEFAULT_RADIUS_KM};

/// Approval state of a [Store].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    /// Waiting for an administrator's review. Not shown to clients.
    #[default]
    Pending,

    /// Approved by an administrator.
    Accepted,

    /// Rejected by an administrator.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown store status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for StoreStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" | "approved" => Ok(Self::Accepted),
            "declined" | "cancelled" | "rejected" => Ok(Self::Declined),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl StoreStatus {
    /// Migrates the approval flags used by older records into a single status.
    ///
    /// `state` takes precedence over `status`; only if neither is present is
    /// the `approved` flag consulted. Unrecognized strings become [StoreStatus::Pending].
    pub fn from_legacy(approved: Option<bool>, status: Option<&str>, state: Option<&str>) -> Self {
        match state.or(status) {
            Some(s) => s.parse().unwrap_or_else(|e| {
                log::warn!("{}, treating as pending", e);
                Self::Pending
            }),
            None if approved == Some(true) => Self::Accepted,
            None => Self::Pending,
        }
    }
}

/// A store, as returned by the marketplace API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoreRecord")]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub coordinates: Location,
    pub owner_id: Option<i64>,
    pub status: StoreStatus,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// Wire form of a [Store], accepting every spelling of the owner and approval fields.
#[derive(Deserialize)]
struct StoreRecord {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    coordinates: Location,
    #[serde(default, alias = "user_id", alias = "ownerId")]
    owner_id: Option<i64>,
    #[serde(default)]
    approved: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<StoreRecord> for Store {
    fn from(r: StoreRecord) -> Self {
        Self {
            status: StoreStatus::from_legacy(r.approved, r.status.as_deref(), r.state.as_deref()),
            id: r.id,
            name: r.name,
            coordinates: r.coordinates,
            owner_id: r.owner_id,
            address: r.address,
            description: r.description,
        }
    }
}

impl Located for Store {
    fn location(&self) -> &Location {
        &self.coordinates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Client,
    Owner,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type")]
    pub kind: UserKind,
    #[serde(default)]
    pub coordinates: Location,
    /// Radius of interest, in kilometers. Missing or `null` means [DEFAULT_RADIUS_KM].
    #[serde(
        rename = "radius",
        default = "default_radius_km",
        deserialize_with = "radius_or_default"
    )]
    pub radius_km: f64,
    #[serde(default)]
    pub address: Option<String>,
}

fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

fn radius_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_RADIUS_KM))
}

impl User {
    /// Builds the query selecting stores relevant to this user.
    /// Administrators see all stores, regardless of their radius.
    ///
    /// Returns `None` if the user's own location is unknown.
    pub fn radius_query(&self) -> Option<RadiusQuery> {
        self.coordinates.point().map(|origin| {
            RadiusQuery::new(origin, self.radius_km).with_bypass(self.kind == UserKind::Admin)
        })
    }
}

impl Located for User {
    fn location(&self) -> &Location {
        &self.coordinates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    #[serde(default, alias = "hasDiscount")]
    pub has_discount: bool,
    /// Discount in percent.
    #[serde(default)]
    pub discount: f64,
    #[serde(default, alias = "discountPrice")]
    pub discount_price: Option<f64>,
    #[serde(alias = "shop_id", alias = "storeId")]
    pub store_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    /// Price after the discount, if any. An explicit `discount_price` wins
    /// over the percentage.
    pub fn effective_price(&self) -> f64 {
        if !self.has_discount {
            self.price
        } else if let Some(p) = self.discount_price {
            p
        } else {
            self.price * (1.0 - self.discount / 100.0)
        }
    }

    /// Discounted products are advertised as offers.
    pub fn is_offer(&self) -> bool {
        self.has_discount
    }
}

/// Everything the marketplace API returned, held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Lookups by id return the last record with that id, as later records are newer.
impl Dataset {
    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().rev().find(|u| u.id == id)
    }

    pub fn store(&self, id: i64) -> Option<&Store> {
        self.stores.iter().rev().find(|s| s.id == id)
    }

    pub fn stores_of(&self, owner_id: i64) -> impl Iterator<Item = &Store> {
        self.stores
            .iter()
            .filter(move |s| s.owner_id == Some(owner_id))
    }

    pub fn approved_stores(&self) -> impl Iterator<Item = &Store> {
        self.stores
            .iter()
            .filter(|s| s.status == StoreStatus::Accepted)
    }

    pub fn products_of(&self, store_id: i64) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(move |p| p.store_id == store_id)
    }

    /// Returns all users, deduplicated by id (keeping the last record for each id).
    pub fn unique_users(&self) -> impl Iterator<Item = &User> {
        self.users
            .iter()
            .map(|u| (u.id, u))
            .collect::<BTreeMap<_, _>>()
            .into_values()
    }
}

/// An approved store shown to a user, with its distance and catalog size.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreListing<'a> {
    pub store: &'a Store,
    /// Distance from the user, in kilometers. `NaN` if either location is unknown.
    pub distance_km: f64,
    pub products: usize,
    pub offers: usize,
}

impl<'a> StoreListing<'a> {
    fn new(ranked: Ranked<&'a Store>, dataset: &'a Dataset) -> Self {
        let (products, offers) = dataset
            .products_of(ranked.entity.id)
            .fold((0, 0), |(all, offers), p| {
                (all + 1, offers + usize::from(p.is_offer()))
            });

        Self {
            store: ranked.entity,
            distance_km: ranked.distance_km,
            products,
            offers,
        }
    }
}

/// Lists the approved stores selected by a query, closest first.
pub fn stores_near<'a>(query: &RadiusQuery, dataset: &'a Dataset) -> Vec<StoreListing<'a>> {
    within_radius_sorted(query, dataset.approved_stores())
        .into_iter()
        .map(|r| StoreListing::new(r, dataset))
        .collect()
}

/// Lists the approved stores relevant to a user, closest first.
///
/// Clients and owners get stores within their radius. Administrators get every
/// approved store; if an administrator's location is unknown, distances are `NaN`.
/// A non-administrator with an unknown location gets nothing.
pub fn nearby_stores<'a>(user: &User, dataset: &'a Dataset) -> Vec<StoreListing<'a>> {
    match user.radius_query() {
        Some(query) => stores_near(&query, dataset),
        None if user.kind == UserKind::Admin => dataset
            .approved_stores()
            .map(|entity| {
                let ranked = Ranked {
                    entity,
                    distance_km: f64::NAN,
                };
                StoreListing::new(ranked, dataset)
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Totals shown on the administrator panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminSummary {
    pub pending_stores: usize,
    pub accepted_stores: usize,
    pub declined_stores: usize,
    /// Approved stores with at least one offer.
    pub stores_with_offers: usize,
    pub products: usize,
    pub offers: usize,
    pub owners: usize,
    pub clients: usize,
}

impl AdminSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut summary = Self {
            products: dataset.products.len(),
            offers: dataset.products.iter().filter(|p| p.is_offer()).count(),
            stores_with_offers: dataset
                .approved_stores()
                .filter(|s| dataset.products_of(s.id).any(Product::is_offer))
                .count(),
            ..Self::default()
        };

        for store in &dataset.stores {
            match store.status {
                StoreStatus::Pending => summary.pending_stores += 1,
                StoreStatus::Accepted => summary.accepted_stores += 1,
                StoreStatus::Declined => summary.declined_stores += 1,
            }
        }

        for user in dataset.unique_users() {
            match user.kind {
                UserKind::Owner => summary.owners += 1,
                UserKind::Client => summary.clients += 1,
                UserKind::Admin => {}
            }
        }

        summary
    }
}

/// Store counts of a single owner, as listed on the administrator panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnerStores {
    pub owner_id: i64,
    pub accepted: usize,
    pub pending: usize,
    pub declined: usize,
}

impl OwnerStores {
    pub fn of(owner_id: i64, dataset: &Dataset) -> Self {
        let mut counts = Self {
            owner_id,
            accepted: 0,
            pending: 0,
            declined: 0,
        };

        for store in dataset.stores_of(owner_id) {
            match store.status {
                StoreStatus::Pending => counts.pending += 1,
                StoreStatus::Accepted => counts.accepted += 1,
                StoreStatus::Declined => counts.declined += 1,
            }
        }

        counts
    }

    /// Counts stores of every owner in the dataset, ordered by owner id.
    pub fn all(dataset: &Dataset) -> Vec<Self> {
        dataset
            .unique_users()
            .filter(|u| u.kind == UserKind::Owner)
            .map(|u| Self::of(u.id, dataset))
            .collect()
    }
}
