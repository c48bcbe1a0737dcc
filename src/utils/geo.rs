/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Pair every item with its distance to `(lat, lng)` and sort nearest first.
pub fn sort_by_distance<T, F>(items: Vec<T>, lat: f64, lng: f64, coords: F) -> Vec<(T, f64)>
where
    F: Fn(&T) -> (f64, f64),
{
    let mut ranked: Vec<(T, f64)> = items
        .into_iter()
        .map(|item| {
            let (item_lat, item_lng) = coords(&item);
            let distance = haversine_distance(item_lat, item_lng, lat, lng);
            (item, distance)
        })
        .collect();

    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}
