use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use geomarket::market::{self, Dataset, StoreListing};
use geomarket::{reader, GeoPoint, Location, RadiusQuery};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct DatasetLoadError(PathBuf, #[source] reader::Error);

#[derive(Debug, thiserror::Error)]
#[error("no user with id {0}")]
struct UnknownUserError(i64);

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode WKT or WKB hex locations
    Decode {
        /// Locations to decode
        raw: Vec<String>,
    },

    /// Compute the great-circle distance between two points, in kilometers
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lng1: f64,
        lat2: f64,
        lng2: f64,
    },

    /// List approved stores around a user or a position, as GeoJSON
    #[command(allow_negative_numbers = true)]
    Nearby(NearbyArgs),

    /// Print totals shown on the administrator panel, as JSON
    Summary {
        /// The path to the dataset file
        dataset: PathBuf,
    },
}

#[derive(Args)]
struct NearbyArgs {
    /// The path to the dataset file
    dataset: PathBuf,

    /// Use the location and radius of the user with this id
    #[arg(long, conflicts_with_all = ["lat", "lng", "radius", "all"])]
    user: Option<i64>,

    /// Latitude of the reference position
    #[arg(long, requires = "lng", required_unless_present = "user")]
    lat: Option<f64>,

    /// Longitude of the reference position
    #[arg(long, requires = "lat", required_unless_present = "user")]
    lng: Option<f64>,

    /// Radius of interest, in kilometers
    #[arg(long, default_value_t = geomarket::DEFAULT_RADIUS_KM)]
    radius: f64,

    /// List all approved stores, regardless of distance
    #[arg(long)]
    all: bool,

    /// Ignore stores whose location can't be decoded
    #[arg(long)]
    skip_unlocated: bool,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    colog::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Decode { raw } => decode(&raw),

        Command::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        } => {
            let d = geomarket::earth_distance(GeoPoint::new(lat1, lng1), GeoPoint::new(lat2, lng2));
            println!("{}", d);
        }

        Command::Nearby(args) => nearby(&args)?,

        Command::Summary { dataset } => {
            let dataset = load_dataset(&dataset, &reader::Options::default())?;
            let summary = json!({
                "totals": market::AdminSummary::from_dataset(&dataset),
                "owners": market::OwnerStores::all(&dataset),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn decode(raw: &[String]) {
    for r in raw {
        match Location::try_parse(r) {
            Ok(location) => {
                let format = match location {
                    Location::Wkt(_) => "wkt",
                    Location::WkbHex(_) => "wkb",
                    Location::Unparseable => "unparseable",
                };
                let p = location.point_or_origin();
                println!("{}\t{}\t{}", format, p.lat, p.lng);
            }
            Err(e) => {
                log::warn!("{:?}: {}", r, e);
                println!("unparseable\t0\t0");
            }
        }
    }
}

fn nearby(args: &NearbyArgs) -> Result<(), Box<dyn Error>> {
    let options = reader::Options {
        skip_unlocated: args.skip_unlocated,
        ..reader::Options::default()
    };
    let dataset = load_dataset(&args.dataset, &options)?;

    let listings = match (args.user, args.lat, args.lng) {
        (Some(id), _, _) => {
            let user = dataset.user(id).ok_or(UnknownUserError(id))?;
            if !user.coordinates.is_decodable() {
                log::warn!("user {}: location can't be decoded", id);
            }
            market::nearby_stores(user, &dataset)
        }

        (None, Some(lat), Some(lng)) => {
            let query = RadiusQuery::new(GeoPoint::new(lat, lng), args.radius).with_bypass(args.all);
            market::stores_near(&query, &dataset)
        }

        _ => unreachable!("clap requires either --user or both --lat and --lng"),
    };

    log::info!("{} stores found", listings.len());
    println!("{}", serde_json::to_string_pretty(&feature_collection(&listings))?);
    Ok(())
}

fn feature_collection(listings: &[StoreListing<'_>]) -> serde_json::Value {
    let features = listings
        .iter()
        .map(|l| {
            let geometry = l.store.coordinates.point().map(|p| {
                json!({
                    "type": "Point",
                    "coordinates": [p.lng, p.lat],
                })
            });

            json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": {
                    "id": l.store.id,
                    "name": l.store.name,
                    "address": l.store.address,
                    "distance_km": geomarket::round_km(l.distance_km),
                    "products": l.products,
                    "offers": l.offers,
                },
            })
        })
        .collect::<Vec<_>>();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn load_dataset<P: AsRef<Path>>(
    path: P,
    options: &reader::Options,
) -> Result<Dataset, DatasetLoadError> {
    match reader::load_dataset_from_file(options, path.as_ref()) {
        Ok(d) => Ok(d),
        Err(e) => Err(DatasetLoadError(PathBuf::from(path.as_ref()), e)),
    }
}
