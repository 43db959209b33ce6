mod helpers;
mod controller_scenarios;
