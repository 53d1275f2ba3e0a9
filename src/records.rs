//! Structured-record hooks for external serialization collaborators.
//!
//! File formats are out of scope for this crate; a reader is expected to produce a
//! [`Record`] (a tagged, ordered decomposition of a cast or collection) and hand it to
//! [`from_record`], and a writer receives the inverse from [`to_record`]. A record
//! without a type discriminator is reported as corrupt, distinctly from one with an
//! unrecognized discriminator.

use std::str::FromStr;

use strum_macros::{Display, EnumString};

use crate::{
    cast::{Cast, CtdCast, LadcpCast, Property, XbtCast},
    collection::CastCollection,
    error::{AnalysisError, Result},
};

/// The type discriminator carried by every structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum RecordKind {
    /// A generic cast.
    #[strum(serialize = "cast")]
    Cast,
    /// A salinity/temperature cast keyed by pressure.
    #[strum(serialize = "ctdcast")]
    CtdCast,
    /// A temperature cast keyed by depth.
    #[strum(serialize = "xbtcast")]
    XbtCast,
    /// A velocity cast keyed by depth.
    #[strum(serialize = "ladcpcast")]
    LadcpCast,
    /// An ordered sequence of casts.
    #[strum(serialize = "castcollection")]
    CastCollection,
}

/// A structural decomposition of a cast or collection, as an external reader or writer
/// sees it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// The type discriminator, `None` when the source data lacks one.
    pub kind: Option<String>,
    /// Name of the vertical coordinate field.
    pub primary_key: String,
    /// Longitude and latitude in degrees, when known.
    pub coordinates: Option<(f64, f64)>,
    /// Ordered vector fields; the primary key comes first.
    pub fields: Vec<(String, Vec<f64>)>,
    /// Scalar properties.
    pub properties: Vec<(String, Property)>,
    /// Child records, non-empty only for collections.
    pub casts: Vec<Record>,
}

/// Any entity a record can reconstruct into.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A generic cast.
    Cast(Cast),
    /// A CTD cast.
    Ctd(CtdCast),
    /// A temperature cast.
    Xbt(XbtCast),
    /// A velocity cast.
    Ladcp(LadcpCast),
    /// A cast collection.
    Collection(CastCollection),
}

impl Entity {
    /// Unwrap any cast entity into the generic `Cast`; collections are returned as an
    /// error value unchanged.
    fn into_cast(self) -> std::result::Result<Cast, Entity> {
        match self {
            Entity::Cast(c) => Ok(c),
            Entity::Ctd(c) => Ok(c.into()),
            Entity::Xbt(c) => Ok(c.into()),
            Entity::Ladcp(c) => Ok(c.into()),
            other => Err(other),
        }
    }
}

/// Reconstruct the tagged in-memory entity a record describes.
pub fn from_record(record: &Record) -> Result<Entity> {
    let tag = record.kind.as_deref().ok_or(AnalysisError::CorruptRecord)?;
    let kind = RecordKind::from_str(tag)
        .map_err(|_| AnalysisError::UnknownRecordType(tag.to_owned()))?;

    match kind {
        RecordKind::Cast => Ok(Entity::Cast(cast_from_record(record)?)),
        RecordKind::CtdCast => Ok(Entity::Ctd(CtdCast::from_cast(cast_from_record(record)?)?)),
        RecordKind::XbtCast => Ok(Entity::Xbt(XbtCast::from_cast(cast_from_record(record)?)?)),
        RecordKind::LadcpCast => Ok(Entity::Ladcp(LadcpCast::from_cast(cast_from_record(
            record,
        )?)?)),
        RecordKind::CastCollection => {
            let casts = record
                .casts
                .iter()
                .map(|r| {
                    from_record(r)?
                        .into_cast()
                        .map_err(|_| AnalysisError::CorruptRecord)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Entity::Collection(CastCollection::new(casts)))
        }
    }
}

/// Decompose an entity into the structured record an external writer consumes.
pub fn to_record(entity: &Entity) -> Record {
    match entity {
        Entity::Cast(c) => cast_to_record(c, RecordKind::Cast),
        Entity::Ctd(c) => cast_to_record(c, RecordKind::CtdCast),
        Entity::Xbt(c) => cast_to_record(c, RecordKind::XbtCast),
        Entity::Ladcp(c) => cast_to_record(c, RecordKind::LadcpCast),
        Entity::Collection(coll) => Record {
            kind: Some(RecordKind::CastCollection.to_string()),
            casts: coll
                .iter()
                .map(|c| cast_to_record(c, RecordKind::Cast))
                .collect(),
            ..Record::default()
        },
    }
}

fn cast_from_record(record: &Record) -> Result<Cast> {
    let primary = record
        .fields
        .iter()
        .find(|(name, _)| name == &record.primary_key)
        .ok_or(AnalysisError::CorruptRecord)?;

    let mut cast = Cast::new(&record.primary_key, primary.1.clone());
    for (name, values) in &record.fields {
        if name != &record.primary_key {
            cast = cast.with_field(name, values.clone())?;
        }
    }
    for (name, prop) in &record.properties {
        cast = cast.with_property(name, prop.clone());
    }
    if let Some((lon, lat)) = record.coordinates {
        cast = cast.with_coords(lon, lat);
    }
    Ok(cast)
}

fn cast_to_record(cast: &Cast, kind: RecordKind) -> Record {
    let fields = cast
        .fields()
        .iter()
        .filter_map(|name| {
            cast.field(name)
                .ok()
                .map(|values| (name.clone(), values.to_vec()))
        })
        .collect();

    let mut properties: Vec<(String, Property)> = Vec::new();
    for name in cast.property_keys() {
        if let Ok(prop) = cast.property(name) {
            properties.push((name.to_owned(), prop.clone()));
        }
    }

    Record {
        kind: Some(kind.to_string()),
        primary_key: cast.primary_key().to_owned(),
        coordinates: cast.coords().map(|c| (c.lon, c.lat)),
        fields,
        properties,
        casts: Vec::new(),
    }
}
