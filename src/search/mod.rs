//! Artist search: facet composition and the two fetch modes.
//!
//! Facets combine with AND; values inside a multi-select facet (budget bands,
//! add-ons) combine with OR. Price, occasion and add-on facets apply to a
//! single service, so an artist matches when one of their services satisfies
//! all of them at once.
//!
//! In [`SearchMode::Paginated`] the server filters and paginates. In
//! [`SearchMode::AvailableOn`] the artists free on a date are fetched once and
//! every facet change is evaluated locally against that pool.

mod budget;

pub use budget::BudgetBand;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::api::{or_empty, ArtistApi, Page};
use crate::errors::ClientError;
use crate::models::{Artist, Service};

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Rating,
    PriceAsc,
    PriceDesc,
    Newest,
    Popular,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::PriceAsc => "priceAsc",
            SortKey::PriceDesc => "priceDesc",
            SortKey::Newest => "newest",
            SortKey::Popular => "popular",
        }
    }

    pub fn compare(&self, a: &Artist, b: &Artist) -> Ordering {
        match self {
            SortKey::Rating => b
                .rating
                .total_cmp(&a.rating)
                .then_with(|| b.bookings_count.cmp(&a.bookings_count)),
            SortKey::PriceAsc => cmp_price(a.min_price(), b.min_price(), false),
            SortKey::PriceDesc => cmp_price(a.min_price(), b.min_price(), true),
            SortKey::Newest => b.created_at.cmp(&a.created_at),
            SortKey::Popular => b
                .bookings_count
                .cmp(&a.bookings_count)
                .then_with(|| b.rating.total_cmp(&a.rating)),
        }
    }
}

/// Artists without services sort last in both price directions.
fn cmp_price(a: Option<u64>, b: Option<u64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl FromStr for SortKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating" => Ok(SortKey::Rating),
            "priceAsc" => Ok(SortKey::PriceAsc),
            "priceDesc" => Ok(SortKey::PriceDesc),
            "newest" => Ok(SortKey::Newest),
            "popular" => Ok(SortKey::Popular),
            other => Err(ClientError::Validation(format!("Unknown sort key: {}", other))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selected facets. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistFilter {
    pub query: Option<String>,
    pub location: Option<String>,
    pub occasion: Option<String>,
    pub style: Option<String>,
    pub min_rating: Option<f32>,
    pub budgets: Vec<BudgetBand>,
    pub add_ons: Vec<String>,
    pub sort: SortKey,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ArtistFilter {
    fn has_service_facets(&self) -> bool {
        non_blank(&self.occasion).is_some() || !self.budgets.is_empty() || !self.add_ons.is_empty()
    }

    fn matches_profile(&self, artist: &Artist) -> bool {
        if let Some(query) = non_blank(&self.query) {
            let hit = contains_ci(&artist.name, query)
                || artist.bio.as_deref().is_some_and(|b| contains_ci(b, query))
                || artist.styles.iter().any(|s| contains_ci(s, query))
                || artist.services.iter().any(|s| contains_ci(&s.name, query));
            if !hit {
                return false;
            }
        }
        if let Some(location) = non_blank(&self.location) {
            if !artist
                .location
                .as_deref()
                .is_some_and(|l| contains_ci(l, location))
            {
                return false;
            }
        }
        if let Some(style) = non_blank(&self.style) {
            if !artist.styles.iter().any(|s| contains_ci(s, style)) {
                return false;
            }
        }
        match self.min_rating {
            Some(floor) => artist.rating >= floor,
            None => true,
        }
    }

    fn matches_offer(&self, service: &Service) -> bool {
        if let Some(occasion) = non_blank(&self.occasion) {
            if !service
                .occasion
                .as_deref()
                .is_some_and(|o| contains_ci(o, occasion))
            {
                return false;
            }
        }
        if !self.budgets.is_empty() && !self.budgets.iter().any(|b| b.contains(service.price)) {
            return false;
        }
        self.add_ons.is_empty()
            || self
                .add_ons
                .iter()
                .any(|wanted| service.add_ons.iter().any(|a| a.eq_ignore_ascii_case(wanted)))
    }

    /// Whether one service of `artist` satisfies every facet.
    pub fn matches_service(&self, artist: &Artist, service: &Service) -> bool {
        self.matches_profile(artist) && self.matches_offer(service)
    }

    pub fn matches_artist(&self, artist: &Artist) -> bool {
        self.matches_profile(artist)
            && (!self.has_service_facets()
                || artist.services.iter().any(|s| self.matches_offer(s)))
    }

    /// Query string for the server-side search.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text_facets = [
            ("q", &self.query),
            ("location", &self.location),
            ("occasion", &self.occasion),
            ("style", &self.style),
        ];
        for (key, value) in text_facets {
            if let Some(value) = non_blank(value) {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(rating) = self.min_rating {
            pairs.push(("minRating", rating.to_string()));
        }
        for band in &self.budgets {
            pairs.push(("budget", band.label().to_string()));
        }
        if !self.add_ons.is_empty() {
            pairs.push(("addOns", self.add_ons.join(",")));
        }
        pairs.push(("sort", self.sort.as_str().to_string()));
        pairs
    }
}

/// Where results come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Paginated,
    AvailableOn(NaiveDate),
}

/// ArtistsList state: facets, mode, page and the visible results.
pub struct ArtistSearch {
    filter: ArtistFilter,
    mode: SearchMode,
    page: u32,
    limit: u32,
    results: Page<Artist>,
    /// Artists free on the selected date, fetched once per date.
    pool: Option<(NaiveDate, Vec<Artist>)>,
}

impl ArtistSearch {
    pub fn new(limit: u32) -> Self {
        Self {
            filter: ArtistFilter::default(),
            mode: SearchMode::Paginated,
            page: 1,
            limit: limit.max(1),
            results: Page::default(),
            pool: None,
        }
    }

    pub fn filter(&self) -> &ArtistFilter {
        &self.filter
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn results(&self) -> &Page<Artist> {
        &self.results
    }

    /// Change facets. Any actual change goes back to page 1.
    pub fn update_filter<F>(&mut self, change: F) -> bool
    where
        F: FnOnce(&mut ArtistFilter),
    {
        let before = self.filter.clone();
        change(&mut self.filter);
        let changed = self.filter != before;
        if changed {
            self.page = 1;
        }
        changed
    }

    pub fn set_filter(&mut self, filter: ArtistFilter) -> bool {
        self.update_filter(|current| *current = filter)
    }

    pub fn set_mode(&mut self, mode: SearchMode) {
        if self.mode != mode {
            self.mode = mode;
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Fetch or recompute the visible page for the current state.
    pub async fn refresh<A: ArtistApi>(&mut self, api: &A) -> &Page<Artist> {
        match self.mode {
            SearchMode::Paginated => self.refresh_paginated(api).await,
            SearchMode::AvailableOn(date) => self.refresh_available(api, date).await,
        }
        &self.results
    }

    async fn refresh_paginated<A: ArtistApi>(&mut self, api: &A) {
        let result = api.search_artists(&self.filter, self.page, self.limit).await;
        self.results = or_empty(result, "artists");
    }

    async fn refresh_available<A: ArtistApi>(&mut self, api: &A, date: NaiveDate) {
        let cached = matches!(&self.pool, Some((pooled, _)) if *pooled == date);
        if !cached {
            match api.available_artists(date).await {
                Ok(artists) => {
                    tracing::debug!("{} artists available on {}", artists.len(), date);
                    self.pool = Some((date, artists));
                }
                Err(e) => {
                    tracing::warn!("Failed to load artists available on {}: {}", date, e);
                    self.results = Page::default();
                    return;
                }
            }
        }

        let pool = self.pool.as_ref().map(|(_, a)| a.as_slice()).unwrap_or_default();
        self.results = paginate_locally(pool, &self.filter, self.page, self.limit);
    }
}

fn paginate_locally(pool: &[Artist], filter: &ArtistFilter, page: u32, limit: u32) -> Page<Artist> {
    let mut matched: Vec<&Artist> = pool.iter().filter(|a| filter.matches_artist(a)).collect();
    matched.sort_by(|a, b| filter.sort.compare(a, b));

    let total = matched.len() as u64;
    let total_pages = total.div_ceil(u64::from(limit)) as u32;
    let start = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
    let items = matched
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();

    Page {
        items,
        total,
        page,
        total_pages,
    }
}
