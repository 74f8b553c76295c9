//! Prometheus metrics definitions and collection logic.
//!
//! This module defines all Prometheus metrics exposed by the exporter and
//! translates TeslaFi snapshots into gauge values.
//!
//! Values are never reset: a gauge keeps the last value seen for its field
//! until a later snapshot carries that field again, and a failed fetch leaves
//! every gauge untouched. Gauges that have never received a value are not
//! rendered.

use crate::client::{TeslaFiClient, LAST_GOOD_TEMP_COMMAND};
use crate::error::{Result, TeslaFiError};
use crate::snapshot::Snapshot;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const NAMESPACE: &str = "teslafi";

const MILES_TO_METERS: f64 = 1609.344;
const MPH_TO_KMH: f64 = 1.609344;
const HOURS_TO_SECONDS: f64 = 3600.0;

/// Reads one numeric value out of a snapshot.
type Extract = fn(&Snapshot) -> Option<f64>;

/// Reads one string value out of a snapshot.
type ExtractText = for<'a> fn(&'a Snapshot) -> Option<&'a str>;

const NO_LABELS: &[&str] = &[];

fn flag(value: Option<bool>) -> Option<f64> {
    value.map(|on| if on { 1.0 } else { 0.0 })
}

/// A single unlabelled gauge.
struct ScalarMetric {
    name: &'static str,
    help: &'static str,
    value: Extract,
}

/// A gauge family with one label, one series per label value.
struct LabeledMetric {
    name: &'static str,
    help: &'static str,
    label: &'static str,
    series: &'static [(&'static str, Extract)],
}

/// An enumerated string exposed as `{state="..."}` series, 1 for the current
/// state and 0 for the other known ones.
struct StateMetric {
    name: &'static str,
    help: &'static str,
    known: &'static [&'static str],
    value: ExtractText,
}

/// A constant 1 gauge carrying descriptive labels.
struct InfoMetric {
    name: &'static str,
    help: &'static str,
    labels: &'static [(&'static str, ExtractText)],
}

const SCALAR_METRICS: &[ScalarMetric] = &[
    ScalarMetric {
        name: "data_id",
        help: "TeslaFi ID of the data record",
        value: |s| s.data_id,
    },
    ScalarMetric {
        name: "polling",
        help: "TeslaFi polling (0=false, 1=true)",
        value: |s| flag(s.polling),
    },
    ScalarMetric {
        name: "odometer_meter",
        help: "Odometer in meters",
        value: |s| s.odometer.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "outside_temperature",
        help: "Outside temperature in °C",
        value: |s| s.outside_temp,
    },
    ScalarMetric {
        name: "inside_temperature",
        help: "Inside temperature in °C",
        value: |s| s.inside_temp,
    },
    ScalarMetric {
        name: "driver_set_temperature",
        help: "Driver set temperature in °C",
        value: |s| s.driver_temp_setting,
    },
    ScalarMetric {
        name: "passenger_set_temperature",
        help: "Passenger set temperature in °C",
        value: |s| s.passenger_temp_setting,
    },
    ScalarMetric {
        name: "fan_status",
        help: "HVAC fan status",
        value: |s| s.fan_status,
    },
    ScalarMetric {
        name: "battery_level",
        help: "Battery level in % SOC",
        value: |s| s.battery_level,
    },
    ScalarMetric {
        name: "usable_battery_level",
        help: "Usable battery level in % SOC (partially locked e.g. because of battery temperature)",
        value: |s| s.usable_battery_level,
    },
    ScalarMetric {
        name: "battery_range_meter",
        help: "Rated range in meters",
        value: |s| s.battery_range.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "battery_range_ideal_meter",
        help: "Ideal range in meters",
        value: |s| s.ideal_battery_range.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "battery_range_est_meter",
        help: "Estimated range in meters",
        value: |s| s.est_battery_range.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "max_range_meter",
        help: "Maximum range in meters",
        value: |s| s.max_range.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "charge_limit_soc",
        help: "Charge limit in % SOC",
        value: |s| s.charge_limit_soc,
    },
    ScalarMetric {
        name: "gps_as_of",
        help: "Unix timestamp of the GPS fix",
        value: |s| s.gps_as_of,
    },
    ScalarMetric {
        name: "heading",
        help: "Heading in degrees",
        value: |s| s.heading,
    },
    ScalarMetric {
        name: "longitude",
        help: "Longitude in degrees",
        value: |s| s.longitude,
    },
    ScalarMetric {
        name: "latitude",
        help: "Latitude in degrees",
        value: |s| s.latitude,
    },
    ScalarMetric {
        name: "idle_time_minutes",
        help: "Idle time in minutes as reported by TeslaFi",
        value: |s| s.idle_time,
    },
    ScalarMetric {
        name: "sentry_mode",
        help: "Sentry mode (0=off, 1=on)",
        value: |s| flag(s.sentry_mode),
    },
    ScalarMetric {
        name: "locked",
        help: "Locked (0=unlocked, 1=locked)",
        value: |s| flag(s.locked),
    },
    ScalarMetric {
        name: "is_user_present",
        help: "User present (0=no, 1=yes)",
        value: |s| flag(s.is_user_present),
    },
    ScalarMetric {
        name: "in_service",
        help: "Car in service (0=no, 1=yes)",
        value: |s| flag(s.in_service),
    },
    ScalarMetric {
        name: "center_display_state",
        help: "Center display state (0=off)",
        value: |s| s.center_display_state,
    },
    ScalarMetric {
        name: "battery_heater_on",
        help: "Battery heater (0=off, 1=on)",
        value: |s| flag(s.battery_heater_on),
    },
    ScalarMetric {
        name: "is_front_defroster_on",
        help: "Front defroster (0=off, 1=on)",
        value: |s| flag(s.is_front_defroster_on),
    },
    ScalarMetric {
        name: "is_rear_defroster_on",
        help: "Rear defroster (0=off, 1=on)",
        value: |s| flag(s.is_rear_defroster_on),
    },
    ScalarMetric {
        name: "defrost_mode",
        help: "Defrost mode (0=off)",
        value: |s| s.defrost_mode,
    },
    ScalarMetric {
        name: "is_preconditioning",
        help: "Preconditioning (0=off, 1=on)",
        value: |s| flag(s.is_preconditioning),
    },
    ScalarMetric {
        name: "is_auto_conditioning_on",
        help: "Auto conditioning (0=off, 1=on)",
        value: |s| flag(s.is_auto_conditioning_on),
    },
    ScalarMetric {
        name: "is_climate_on",
        help: "Climate on (0=off, 1=on)",
        value: |s| flag(s.is_climate_on),
    },
    ScalarMetric {
        name: "left_temp_direction",
        help: "Left temperature direction",
        value: |s| s.left_temp_direction,
    },
    ScalarMetric {
        name: "right_temp_direction",
        help: "Right temperature direction",
        value: |s| s.right_temp_direction,
    },
    ScalarMetric {
        name: "charge_port_cold_weather_mode",
        help: "Charge port cold weather mode (0=off, 1=on)",
        value: |s| flag(s.charge_port_cold_weather_mode),
    },
    ScalarMetric {
        name: "charge_port_door_open",
        help: "Charge port door open (0=closed, 1=open)",
        value: |s| flag(s.charge_port_door_open),
    },
    ScalarMetric {
        name: "time_to_full_charge_seconds",
        help: "Estimated time to full charge in seconds",
        value: |s| s.time_to_full_charge.map(|v| v * HOURS_TO_SECONDS),
    },
    ScalarMetric {
        name: "charge_current_request_ampere",
        help: "Requested charge current in ampere (per phase)",
        value: |s| s.charge_current_request,
    },
    ScalarMetric {
        name: "charge_current_request_max_ampere",
        help: "Maximum requestable charge current in ampere",
        value: |s| s.charge_current_request_max,
    },
    ScalarMetric {
        name: "charge_enable_request",
        help: "Charging enabled if possible (0=no, 1=yes)",
        value: |s| flag(s.charge_enable_request),
    },
    ScalarMetric {
        name: "charger_power_kw",
        help: "Charge power in kW",
        value: |s| s.charger_power,
    },
    ScalarMetric {
        name: "charger_pilot_current_ampere",
        help: "Maximum current allowed by the charger in ampere per phase",
        value: |s| s.charger_pilot_current,
    },
    ScalarMetric {
        name: "charger_actual_current_ampere",
        help: "Actual charge current in ampere per phase",
        value: |s| s.charger_actual_current,
    },
    ScalarMetric {
        name: "charge_energy_added_kwh",
        help: "Energy charged since start of the current/last charge session in kWh",
        value: |s| s.charge_energy_added,
    },
    ScalarMetric {
        name: "charge_range_ideal_added_meter",
        help: "Ideal range added since start of the current/last charge session in meters",
        value: |s| s.charge_miles_added_ideal.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "charge_range_rated_added_meter",
        help: "Rated range added since start of the current/last charge session in meters",
        value: |s| s.charge_miles_added_rated.map(|v| v * MILES_TO_METERS),
    },
    ScalarMetric {
        name: "charge_rate_kmh",
        help: "Charge rate in km of range per hour",
        value: |s| s.charge_rate.map(|v| v * MPH_TO_KMH),
    },
    ScalarMetric {
        name: "charger_voltage",
        help: "Charger voltage in volt",
        value: |s| s.charger_voltage,
    },
    ScalarMetric {
        name: "fast_charger_present",
        help: "Fast charger present (0=no, 1=yes)",
        value: |s| flag(s.fast_charger_present),
    },
    ScalarMetric {
        name: "trip_charging",
        help: "Trip charging (0=no, 1=yes)",
        value: |s| flag(s.trip_charging),
    },
    ScalarMetric {
        name: "speed_kmh",
        help: "Speed in km/h",
        value: |s| s.speed.map(|v| v * MPH_TO_KMH),
    },
    ScalarMetric {
        name: "power_kw",
        help: "Current power use in kW, negative during regen",
        value: |s| s.power,
    },
];

const LABELED_METRICS: &[LabeledMetric] = &[
    LabeledMetric {
        name: "state_count",
        help: "Number of states monitored by TeslaFi",
        label: "state",
        series: &[
            ("idle", |s| s.idle_number),
            ("sleep", |s| s.sleep_number),
            ("drive", |s| s.drive_number),
            ("charge", |s| s.charge_number),
        ],
    },
    LabeledMetric {
        name: "door_open",
        help: "Door state (0=closed, 1=open)",
        label: "location",
        series: &[
            ("front driver", |s| s.df),
            ("rear driver", |s| s.dr),
            ("front passenger", |s| s.pf),
            ("rear passenger", |s| s.pr),
            ("front trunk", |s| s.ft),
            ("rear trunk", |s| s.rt),
        ],
    },
    LabeledMetric {
        name: "window_open",
        help: "Window state (0=closed, otherwise open)",
        label: "location",
        series: &[
            ("front driver", |s| s.fd_window),
            ("rear driver", |s| s.rd_window),
            ("front passenger", |s| s.fp_window),
            ("rear passenger", |s| s.rp_window),
        ],
    },
    LabeledMetric {
        name: "seat_heater",
        help: "Seat heater level (0=off)",
        label: "location",
        series: &[
            ("front driver", |s| s.seat_heater_left),
            ("rear driver", |s| s.seat_heater_rear_left),
            ("front passenger", |s| s.seat_heater_right),
            ("rear passenger", |s| s.seat_heater_rear_right),
            ("rear center", |s| s.seat_heater_rear_center),
        ],
    },
];

const STATE_METRICS: &[StateMetric] = &[
    StateMetric {
        name: "charging_state",
        help: "Charging state",
        known: &[
            "Disconnected",
            "Charging",
            "Complete",
            "Stopped",
            "Starting",
            "NoPower",
        ],
        value: |s| s.charging_state.as_deref(),
    },
    StateMetric {
        name: "car_state",
        help: "Car state as tracked by TeslaFi",
        known: &["Sleeping", "Idling", "Driving", "Charging"],
        value: |s| s.car_state.as_deref(),
    },
    StateMetric {
        name: "api_state",
        help: "Tesla API state",
        known: &["online", "asleep", "offline"],
        value: |s| s.state.as_deref(),
    },
    StateMetric {
        name: "shift_state",
        help: "Shift state",
        known: &["None", "P", "R", "N", "D"],
        value: |s| s.shift_state.as_deref(),
    },
    StateMetric {
        name: "charger_phases",
        help: "Charger phases",
        known: &["None", "1", "2", "3"],
        value: |s| s.charger_phases.as_deref(),
    },
    StateMetric {
        name: "fast_charger_type",
        help: "Fast charger type",
        known: &["None", "Supercharger", "CHAdeMO", "Combo"],
        value: |s| {
            s.fast_charger_type
                .as_deref()
                .map(|t| if t == "<invalid>" { "None" } else { t })
        },
    },
    StateMetric {
        name: "charge_port_latch",
        help: "Charge port latch status",
        known: &["Engaged", "Disengaged", "Blocking"],
        value: |s| s.charge_port_latch.as_deref(),
    },
    StateMetric {
        name: "charge_port_led_color",
        help: "Charge port LED color",
        known: &["None", "Off", "Green", "Blue", "Red", "White"],
        value: |s| s.charge_port_led_color.as_deref(),
    },
];

const INFO_METRICS: &[InfoMetric] = &[
    InfoMetric {
        name: "info",
        help: "TeslaFi car info (almost never changing)",
        labels: &[
            ("vin", |s| s.vin.as_deref()),
            ("display_name", |s| s.display_name.as_deref()),
            ("vehicle_id", |s| s.vehicle_id.as_deref()),
            ("option_codes", |s| s.option_codes.as_deref()),
            ("exterior_color", |s| s.exterior_color.as_deref()),
            ("roof_color", |s| s.roof_color.as_deref()),
            ("measure", |s| s.measure.as_deref()),
            ("eu_vehicle", |s| s.eu_vehicle.as_deref()),
            ("rhd", |s| s.rhd.as_deref()),
            ("motorized_charge_port", |s| s.motorized_charge_port.as_deref()),
            ("spoiler_type", |s| s.spoiler_type.as_deref()),
            ("third_row_seats", |s| s.third_row_seats.as_deref()),
            ("car_type", |s| s.car_type.as_deref()),
            ("rear_seat_heaters", |s| s.rear_seat_heaters.as_deref()),
        ],
    },
    InfoMetric {
        name: "status_info",
        help: "TeslaFi car info (rarely changing)",
        labels: &[
            ("vin", |s| s.vin.as_deref()),
            ("display_name", |s| s.display_name.as_deref()),
            ("vehicle_name", |s| s.vehicle_name.as_deref()),
            ("car_version", |s| s.car_version.as_deref()),
            ("new_version", |s| s.new_version.as_deref()),
            ("wheel_type", |s| s.wheel_type.as_deref()),
            ("api_version", |s| s.api_version.as_deref()),
        ],
    },
];

/// A registered gauge family together with its definition.
struct Family<M: 'static> {
    def: &'static M,
    gauges: GaugeVec,
}

/// Scrape bookkeeping, guarded by the scrape lock.
#[derive(Debug, Default)]
struct ScrapeState {
    /// A snapshot with temperatures was applied, or the `lastGoodTemp`
    /// fallback already ran.
    temperatures_known: bool,
}

/// Metrics collector for the TeslaFi exporter.
///
/// Owns its registry. Scrapes are serialised so that concurrent requests never
/// render a half-applied snapshot or hit the TeslaFi API in parallel.
pub struct MetricsCollector {
    client: Arc<TeslaFiClient>,
    registry: Registry,

    scalars: Vec<Family<ScalarMetric>>,
    labeled: Vec<Family<LabeledMetric>>,
    states: Vec<Family<StateMetric>>,
    infos: Vec<Family<InfoMetric>>,

    // Exporter metrics
    last_success_timestamp: GaugeVec,

    /// Last known value of every identity label, merged across snapshots.
    identity: Mutex<HashMap<&'static str, String>>,
    scrape_lock: tokio::sync::Mutex<ScrapeState>,
}

impl MetricsCollector {
    /// Create a new metrics collector and register every gauge family.
    pub fn new(client: Arc<TeslaFiClient>) -> Result<Self> {
        let registry = Registry::new();

        let scalars = SCALAR_METRICS
            .iter()
            .map(|def| -> Result<Family<ScalarMetric>> {
                Ok(Family {
                    def,
                    gauges: register(&registry, def.name, def.help, NO_LABELS)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let labeled = LABELED_METRICS
            .iter()
            .map(|def| -> Result<Family<LabeledMetric>> {
                Ok(Family {
                    def,
                    gauges: register(&registry, def.name, def.help, &[def.label])?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let states = STATE_METRICS
            .iter()
            .map(|def| -> Result<Family<StateMetric>> {
                Ok(Family {
                    def,
                    gauges: register(&registry, def.name, def.help, &["state"])?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let infos = INFO_METRICS
            .iter()
            .map(|def| -> Result<Family<InfoMetric>> {
                let label_names: Vec<&str> = def.labels.iter().map(|(name, _)| *name).collect();
                Ok(Family {
                    def,
                    gauges: register(&registry, def.name, def.help, &label_names)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let last_success_timestamp = register(
            &registry,
            "last_success_timestamp_seconds",
            "Unix timestamp of the last successful TeslaFi fetch",
            NO_LABELS,
        )?;

        Ok(Self {
            client,
            registry,
            scalars,
            labeled,
            states,
            infos,
            last_success_timestamp,
            identity: Mutex::new(HashMap::new()),
            scrape_lock: tokio::sync::Mutex::new(ScrapeState::default()),
        })
    }

    /// Fetch a snapshot from TeslaFi and apply it.
    ///
    /// On error nothing is modified.
    pub async fn collect(&self) -> Result<()> {
        let mut state = self.scrape_lock.lock().await;
        self.collect_locked(&mut state).await
    }

    /// Serve one scrape: collect, then render.
    ///
    /// Fetch failures are logged and the previously collected values are
    /// rendered instead. Only a render failure is returned.
    pub async fn scrape(&self) -> Result<String> {
        let mut state = self.scrape_lock.lock().await;

        if let Err(e) = self.collect_locked(&mut state).await {
            warn!("Failed to collect metrics, serving last known values: {}", e);
        }

        self.render()
    }

    async fn collect_locked(&self, state: &mut ScrapeState) -> Result<()> {
        info!("Collecting metrics from TeslaFi");

        let snapshot = self.client.fetch_snapshot().await?;

        if snapshot.has_temperatures() {
            state.temperatures_known = true;
        } else if !state.temperatures_known {
            // Sleeping car right after startup: seed the climate gauges once.
            match self.client.fetch_command(LAST_GOOD_TEMP_COMMAND).await {
                Ok(older) => {
                    debug!("Applying {} snapshot", LAST_GOOD_TEMP_COMMAND);
                    self.update(&older);
                    state.temperatures_known = true;
                }
                Err(e) => warn!("Failed to fetch {}: {}", LAST_GOOD_TEMP_COMMAND, e),
            }
        }

        self.update(&snapshot);
        self.last_success_timestamp
            .with_label_values(NO_LABELS)
            .set(unix_now());

        info!("Successfully collected metrics");
        Ok(())
    }

    /// Apply a snapshot to the gauges. Fields missing from the snapshot keep
    /// their previous values.
    pub fn update(&self, snapshot: &Snapshot) {
        let mut updated = 0usize;

        for family in &self.scalars {
            if let Some(value) = (family.def.value)(snapshot) {
                family.gauges.with_label_values(NO_LABELS).set(value);
                updated += 1;
            }
        }

        for family in &self.labeled {
            for (label, extract) in family.def.series {
                if let Some(value) = extract(snapshot) {
                    family.gauges.with_label_values(&[*label]).set(value);
                    updated += 1;
                }
            }
        }

        for family in &self.states {
            if let Some(current) = (family.def.value)(snapshot) {
                self.update_state(family, current);
                updated += 1;
            }
        }

        self.update_identity(snapshot);

        debug!("Updated {} series from snapshot", updated);
    }

    fn update_state(&self, family: &Family<StateMetric>, current: &str) {
        if !family.def.known.iter().any(|known| *known == current) {
            info!("Unknown/unexpected {}: {}", family.def.name, current);
        }

        // Drops a previously seen unknown state so only one series reads 1.
        family.gauges.reset();
        for known in family.def.known {
            family.gauges.with_label_values(&[*known]).set(0.0);
        }
        family.gauges.with_label_values(&[current]).set(1.0);
    }

    fn update_identity(&self, snapshot: &Snapshot) {
        let mut identity = self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut changed = false;
        for family in &self.infos {
            for (label, extract) in family.def.labels {
                if let Some(value) = extract(snapshot) {
                    if identity.get(label).map(String::as_str) != Some(value) {
                        identity.insert(*label, value.to_string());
                        changed = true;
                    }
                }
            }
        }

        if !changed {
            return;
        }

        for family in &self.infos {
            let values: Vec<&str> = family
                .def
                .labels
                .iter()
                .map(|(label, _)| identity.get(label).map(String::as_str).unwrap_or(""))
                .collect();
            family.gauges.reset();
            family.gauges.with_label_values(values.as_slice()).set(1.0);
        }
    }

    /// Render all populated metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::with_capacity(8192);
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TeslaFiError::Metrics(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| TeslaFiError::Metrics(e.to_string()))
    }
}

/// Create a namespaced gauge family and register it.
fn register(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let gauges = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
        .map_err(|e| TeslaFiError::Metrics(e.to_string()))?;
    registry
        .register(Box::new(gauges.clone()))
        .map_err(|e| TeslaFiError::Metrics(e.to_string()))?;
    Ok(gauges)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
