//! Property inventory use-cases.
//!
//! # Responsibility
//! - Validate and persist properties and their lookup records.
//! - Serve the listing, map, comparison and gallery views.
//! - Manage per-property attached records.

use crate::model::property::{
    Client, ClientId, Owner, OwnerId, Property, PropertyAmenity, PropertyDocument,
    PropertyExpense, PropertyId, PropertyImage, PropertyInspection, PropertyRevenue,
    PropertyStatus, PropertyType, PropertyTypeId, PropertyValuation,
};
use crate::model::ValidationError;
use crate::repo::property_record_repo::{PropertyRecordKind, PropertyRecordRepository};
use crate::repo::property_repo::{
    DisplayMode, PropertyFilter, PropertyListItem, PropertyRepository, PropertySort,
    PropertySummary, COMPARISON_LIMIT,
};
use crate::repo::{Page, PageRequest, RepoError};
use chrono::{Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PropertyServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("at most {COMPARISON_LIMIT} properties can be compared, got {0}")]
    TooManyToCompare(usize),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for PropertyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type PropertyResult<T> = Result<T, PropertyServiceError>;

/// One pin on the property map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub uuid: PropertyId,
    pub code: String,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: PropertyStatus,
    pub type_name: String,
    pub rental_price_monthly: Option<Decimal>,
}

/// Listing page together with the summary cards.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyListing {
    pub page: Page<PropertyListItem>,
    pub summary: PropertySummary,
    pub display_mode: DisplayMode,
}

pub struct PropertyService<P: PropertyRepository, R: PropertyRecordRepository> {
    properties: P,
    records: R,
}

impl<P: PropertyRepository, R: PropertyRecordRepository> PropertyService<P, R> {
    pub fn new(properties: P, records: R) -> Self {
        Self {
            properties,
            records,
        }
    }

    pub fn create_type(&self, property_type: &PropertyType) -> PropertyResult<PropertyTypeId> {
        Ok(self.properties.create_type(property_type)?)
    }

    pub fn update_type(&self, property_type: &PropertyType) -> PropertyResult<()> {
        Ok(self.properties.update_type(property_type)?)
    }

    pub fn list_types(&self, active_only: bool) -> PropertyResult<Vec<PropertyType>> {
        Ok(self.properties.list_types(active_only)?)
    }

    pub fn delete_type(&self, id: PropertyTypeId) -> PropertyResult<()> {
        Ok(self.properties.delete_type(id)?)
    }

    pub fn create_owner(&self, owner: &Owner) -> PropertyResult<OwnerId> {
        Ok(self.properties.create_owner(owner)?)
    }

    pub fn create_client(&self, client: &Client) -> PropertyResult<ClientId> {
        Ok(self.properties.create_client(client)?)
    }

    pub fn list_clients(&self) -> PropertyResult<Vec<Client>> {
        Ok(self.properties.list_clients()?)
    }

    pub fn create_property(&self, property: &Property) -> PropertyResult<PropertyId> {
        let id = self.properties.create_property(property)?;
        info!("event=property_create module=properties status=ok property_id={id}");
        Ok(id)
    }

    pub fn update_property(&self, property: &Property) -> PropertyResult<()> {
        self.properties.update_property(property)?;
        info!(
            "event=property_update module=properties status=ok property_id={}",
            property.uuid
        );
        Ok(())
    }

    pub fn get_property(&self, id: PropertyId) -> PropertyResult<PropertyListItem> {
        self.properties
            .get_property(id)?
            .ok_or_else(|| PropertyServiceError::NotFound {
                entity: "property",
                key: id.to_string(),
            })
    }

    pub fn get_property_by_code(&self, code: &str) -> PropertyResult<PropertyListItem> {
        self.properties
            .get_property_by_code(code)?
            .ok_or_else(|| PropertyServiceError::NotFound {
                entity: "property",
                key: code.to_string(),
            })
    }

    pub fn delete_property(&self, id: PropertyId) -> PropertyResult<()> {
        self.properties.delete_property(id)?;
        info!("event=property_delete module=properties status=ok property_id={id}");
        Ok(())
    }

    pub fn toggle_active(&self, id: PropertyId) -> PropertyResult<bool> {
        let active = self.properties.toggle_active(id)?;
        info!("event=property_toggle_active module=properties status=ok property_id={id} is_active={active}");
        Ok(active)
    }

    /// Filtered, sorted page sized by the display mode, plus the unfiltered summary.
    pub fn list_properties(
        &self,
        filter: &PropertyFilter,
        sort: PropertySort,
        mode: DisplayMode,
        page: u32,
    ) -> PropertyResult<PropertyListing> {
        let page = self.properties.list_properties(
            filter,
            sort,
            PageRequest::new(page, mode.page_size()),
        )?;
        Ok(PropertyListing {
            page,
            summary: self.properties.summary()?,
            display_mode: mode,
        })
    }

    pub fn map_markers(&self) -> PropertyResult<Vec<MapMarker>> {
        let markers = self
            .properties
            .list_with_coordinates()?
            .into_iter()
            .filter_map(|item| {
                let (latitude, longitude) = (item.property.latitude?, item.property.longitude?);
                Some(MapMarker {
                    uuid: item.property.uuid,
                    code: item.property.code,
                    title: item.property.title,
                    latitude,
                    longitude,
                    status: item.property.status,
                    type_name: item.type_name,
                    rental_price_monthly: item.property.rental_price_monthly,
                })
            })
            .collect();
        Ok(markers)
    }

    pub fn compare(&self, ids: &[PropertyId]) -> PropertyResult<Vec<PropertyListItem>> {
        if ids.len() > COMPARISON_LIMIT {
            return Err(PropertyServiceError::TooManyToCompare(ids.len()));
        }
        Ok(self.properties.get_for_comparison(ids)?)
    }

    /// Primary image first, then the rest in display order.
    pub fn gallery(&self, property: PropertyId) -> PropertyResult<Vec<PropertyImage>> {
        let mut images = self.records.list_images(property)?;
        images.sort_by_key(|image| !image.is_primary);
        Ok(images)
    }

    pub fn add_image(&self, image: &PropertyImage) -> PropertyResult<Uuid> {
        self.require_property(image.property_uuid)?;
        Ok(self.records.add_image(image)?)
    }

    pub fn add_document(&self, document: &PropertyDocument) -> PropertyResult<Uuid> {
        self.require_property(document.property_uuid)?;
        Ok(self.records.add_document(document)?)
    }

    pub fn list_documents(&self, property: PropertyId) -> PropertyResult<Vec<PropertyDocument>> {
        Ok(self.records.list_documents(property)?)
    }

    /// Documents expiring between `today` and `today + days`.
    pub fn documents_expiring(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> PropertyResult<Vec<PropertyDocument>> {
        let until = today + Duration::days(i64::from(days));
        Ok(self.records.documents_expiring(today, until)?)
    }

    pub fn add_valuation(&self, valuation: &PropertyValuation) -> PropertyResult<Uuid> {
        self.require_property(valuation.property_uuid)?;
        Ok(self.records.add_valuation(valuation)?)
    }

    pub fn list_valuations(&self, property: PropertyId) -> PropertyResult<Vec<PropertyValuation>> {
        Ok(self.records.list_valuations(property)?)
    }

    pub fn add_amenity(&self, amenity: &PropertyAmenity) -> PropertyResult<Uuid> {
        self.require_property(amenity.property_uuid)?;
        Ok(self.records.add_amenity(amenity)?)
    }

    pub fn list_amenities(&self, property: PropertyId) -> PropertyResult<Vec<PropertyAmenity>> {
        Ok(self.records.list_amenities(property)?)
    }

    pub fn add_inspection(&self, inspection: &PropertyInspection) -> PropertyResult<Uuid> {
        self.require_property(inspection.property_uuid)?;
        Ok(self.records.add_inspection(inspection)?)
    }

    pub fn list_inspections(
        &self,
        property: PropertyId,
    ) -> PropertyResult<Vec<PropertyInspection>> {
        Ok(self.records.list_inspections(property)?)
    }

    pub fn add_expense(&self, expense: &PropertyExpense) -> PropertyResult<Uuid> {
        self.require_property(expense.property_uuid)?;
        Ok(self.records.add_expense(expense)?)
    }

    pub fn list_expenses(&self, property: PropertyId) -> PropertyResult<Vec<PropertyExpense>> {
        Ok(self.records.list_expenses(property)?)
    }

    pub fn add_revenue(&self, revenue: &PropertyRevenue) -> PropertyResult<Uuid> {
        self.require_property(revenue.property_uuid)?;
        Ok(self.records.add_revenue(revenue)?)
    }

    pub fn list_revenues(&self, property: PropertyId) -> PropertyResult<Vec<PropertyRevenue>> {
        Ok(self.records.list_revenues(property)?)
    }

    /// Deletes an attached record and returns the property it belonged to.
    pub fn delete_record(&self, kind: PropertyRecordKind, id: Uuid) -> PropertyResult<PropertyId> {
        let property = self.records.delete_record(kind, id)?;
        info!(
            "event=property_record_delete module=properties status=ok property_id={property} kind={kind:?}"
        );
        Ok(property)
    }

    fn require_property(&self, id: PropertyId) -> PropertyResult<()> {
        self.get_property(id).map(|_| ())
    }
}
