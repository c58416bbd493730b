pub mod admin {
    pub mod ownership;
    pub mod registration;
}

pub mod app {
    pub mod config;
    pub mod credentials;
    pub mod network;
}

pub mod cli;

pub mod deployment {
    pub mod manifest;
    pub mod orchestrator;
    pub mod steps;
}

pub mod upgrade {
    pub mod proposal;
    pub mod upgrade_orchestrator;
}

pub mod verification {
    pub mod explorer;
}
