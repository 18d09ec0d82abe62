//! Spherical-earth helpers for clue text. Accurate to a few meters at city scale.

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates
pub fn haversine_meters(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let d_lat = (to_lat - from_lat).to_radians();
    let d_lon = (to_lon - from_lon).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from_lat.to_radians().cos() * to_lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from the first coordinate to the second, in degrees [0, 360)
pub fn bearing_degrees(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let (lat1, lat2) = (from_lat.to_radians(), to_lat.to_radians());
    let d_lon = (to_lon - from_lon).to_radians();
    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Eight-point compass name for a bearing
pub fn compass_point(bearing: f64) -> &'static str {
    const POINTS: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    let sector = ((bearing.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    POINTS[sector]
}
