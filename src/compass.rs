/// Compass arithmetic for headings in degrees (0 is North, clockwise).
/// Also translates headings to 8/16-point compass directions (N, NE, E, etc.)
/// for instructions and telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

/// Clockwise from north, 22.5° apart.
const ROSE: [Direction; 16] = [
    Direction::N,
    Direction::NNE,
    Direction::NE,
    Direction::ENE,
    Direction::E,
    Direction::ESE,
    Direction::SE,
    Direction::SSE,
    Direction::S,
    Direction::SSW,
    Direction::SW,
    Direction::WSW,
    Direction::W,
    Direction::WNW,
    Direction::NW,
    Direction::NNW,
];

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl Direction {
    /// Nearest of the 16 rose points.
    pub fn from_heading_16(heading: f64) -> Direction {
        ROSE[sector(heading, 16)]
    }

    /// Nearest of the 8 principal and intercardinal points.
    pub fn from_heading_8(heading: f64) -> Direction {
        ROSE[sector(heading, 8) * 2]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::N => "north",
            Direction::NNE => "north-northeast",
            Direction::NE => "northeast",
            Direction::ENE => "east-northeast",
            Direction::E => "east",
            Direction::ESE => "east-southeast",
            Direction::SE => "southeast",
            Direction::SSE => "south-southeast",
            Direction::S => "south",
            Direction::SSW => "south-southwest",
            Direction::SW => "southwest",
            Direction::WSW => "west-southwest",
            Direction::W => "west",
            Direction::WNW => "west-northwest",
            Direction::NW => "northwest",
            Direction::NNW => "north-northwest",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NNE => "NNE",
            Direction::NE => "NE",
            Direction::ENE => "ENE",
            Direction::E => "E",
            Direction::ESE => "ESE",
            Direction::SE => "SE",
            Direction::SSE => "SSE",
            Direction::S => "S",
            Direction::SSW => "SSW",
            Direction::SW => "SW",
            Direction::WSW => "WSW",
            Direction::W => "W",
            Direction::WNW => "WNW",
            Direction::NW => "NW",
            Direction::NNW => "NNW",
        }
    }
}

/// Index of the compass sector containing `heading` when the circle is cut
/// into `points` sectors centred on north.
fn sector(heading: f64, points: usize) -> usize {
    let width = 360.0 / points as f64;
    let shifted = normalize(heading + width / 2.0);
    ((shifted / width) as usize) % points
}

/// Wrap any heading into [0, 360).
pub fn normalize(heading: f64) -> f64 {
    let wrapped = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Smallest angle between two headings, in [0, 180].
pub fn heading_deviation(a: f64, b: f64) -> f64 {
    let diff = (normalize(a) - normalize(b)).abs();
    if diff > 180.0 { 360.0 - diff } else { diff }
}
