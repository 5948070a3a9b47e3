// Monthly depreciation rates by device class
//
// Rates are stored in hundredths of a percent so that every calculation
// stays in integer arithmetic: 6375 means 63.75%.

use serde::Serialize;
use std::fmt;

/// Rate applied when no table row matches the device age
pub const MINIMUM_RATE: Rate = Rate(1020);

pub const TABLE_MONTHS: u32 = 48;

// Columns: Computers, Tablets, Phones
const RATES: [[u32; 3]; TABLE_MONTHS as usize] = [
    [6375, 7525, 7525],
    [6100, 7250, 7250],
    [5825, 6975, 6975],
    [5550, 6700, 6700],
    [5275, 6425, 6425],
    [5000, 6150, 6150],
    [4725, 5875, 5875],
    [4450, 5600, 5600],
    [4175, 5325, 5325],
    [3900, 5050, 5050],
    [3625, 4775, 4775],
    [3500, 4500, 4500],
    [3425, 4375, 4375],
    [3350, 4250, 4250],
    [3275, 4125, 4125],
    [3200, 4000, 4000],
    [3125, 3875, 3875],
    [3050, 3750, 3750],
    [2975, 3625, 3625],
    [2900, 3500, 3500],
    [2825, 3375, 3375],
    [2750, 3250, 3250],
    [2675, 3125, 3125],
    [2600, 3000, 3000],
    [2559, 2959, 2892],
    [2518, 2918, 2784],
    [2477, 2877, 2676],
    [2436, 2836, 2568],
    [2395, 2795, 2460],
    [2354, 2754, 2352],
    [2313, 2713, 2244],
    [2272, 2672, 2136],
    [2231, 2631, 2028],
    [2190, 2590, 1920],
    [2149, 2549, 1812],
    [2100, 2500, 1700],
    [2010, 2410, 1655],
    [1920, 2320, 1610],
    [1830, 2230, 1565],
    [1740, 2140, 1520],
    [1650, 2050, 1475],
    [1560, 1960, 1430],
    [1470, 1870, 1385],
    [1380, 1780, 1340],
    [1290, 1690, 1295],
    [1200, 1600, 1250],
    [1110, 1510, 1205],
    [1020, 1420, 1160],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    Computers,
    Tablets,
    Phones,
}

impl DeviceType {
    /// Classify by object type name; anything unrecognised is a computer
    pub fn from_object_type_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return DeviceType::Computers;
        };
        let lowered = name.to_lowercase();
        if lowered.contains("tablet") {
            DeviceType::Tablets
        } else if lowered.contains("phone") {
            DeviceType::Phones
        } else {
            DeviceType::Computers
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Computers => "Computers",
            DeviceType::Tablets => "Tablets",
            DeviceType::Phones => "Phones",
        }
    }

    fn column(self) -> usize {
        match self {
            DeviceType::Computers => 0,
            DeviceType::Tablets => 1,
            DeviceType::Phones => 2,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage in hundredths of a percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rate(u32);

impl Rate {
    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// Rate for a device of the given age. Ages past the table use the last row.
    pub fn for_age(months: u32, device: DeviceType) -> Self {
        let lookup = months.min(TABLE_MONTHS);
        if lookup == 0 {
            return MINIMUM_RATE;
        }
        Rate(RATES[(lookup - 1) as usize][device.column()])
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Rate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_from_name() {
        assert_eq!(DeviceType::from_object_type_name(Some("iPad Tablet")), DeviceType::Tablets);
        assert_eq!(DeviceType::from_object_type_name(Some("Mobile Phones")), DeviceType::Phones);
        assert_eq!(DeviceType::from_object_type_name(Some("Laptops")), DeviceType::Computers);
        assert_eq!(DeviceType::from_object_type_name(None), DeviceType::Computers);
        // Tablet wins when both words appear
        assert_eq!(DeviceType::from_object_type_name(Some("Phone/Tablet")), DeviceType::Tablets);
    }

    #[test]
    fn test_rate_lookup() {
        assert_eq!(Rate::for_age(1, DeviceType::Computers).hundredths(), 6375);
        assert_eq!(Rate::for_age(25, DeviceType::Phones).hundredths(), 2892);
        assert_eq!(Rate::for_age(36, DeviceType::Tablets).hundredths(), 2500);
        assert_eq!(Rate::for_age(48, DeviceType::Computers).hundredths(), 1020);
    }

    #[test]
    fn test_rate_past_table_uses_last_row() {
        assert_eq!(Rate::for_age(120, DeviceType::Tablets), Rate::for_age(48, DeviceType::Tablets));
        assert_eq!(Rate::for_age(49, DeviceType::Phones).hundredths(), 1160);
    }

    #[test]
    fn test_month_zero_uses_minimum() {
        assert_eq!(Rate::for_age(0, DeviceType::Phones), MINIMUM_RATE);
    }

    #[test]
    fn test_rates_never_increase_with_age() {
        for device in [DeviceType::Computers, DeviceType::Tablets, DeviceType::Phones] {
            for month in 2..=TABLE_MONTHS {
                assert!(Rate::for_age(month, device) <= Rate::for_age(month - 1, device));
            }
        }
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate(6375).to_string(), "63.75%");
        assert_eq!(Rate(1020).to_string(), "10.20%");
        assert_eq!(Rate(3500).to_string(), "35.00%");
    }
}
