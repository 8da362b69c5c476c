//! Drive selection and the "are you sure?" confirmation.
use anyhow::{Result, anyhow};
use console::{Term, style};
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use flashr_core::Device;

/// Answers the gate does not need to ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub drive: Option<String>,
    /// `Some(true)` skips the confirmation. Never `Some(false)`: a declined
    /// answer must still be asked for.
    pub yes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answers {
    pub drive: String,
    pub yes: bool,
}

pub trait ConfirmationGate {
    fn prompt(&self, overrides: &Overrides) -> Result<Answers>;
}

/// Asks at the terminal with `dialoguer`, offering the devices `list_devices`
/// returns.
pub struct DialoguerGate<L> {
    list_devices: L,
}

impl<L> DialoguerGate<L>
where
    L: Fn() -> Result<Vec<Device>>,
{
    pub fn new(list_devices: L) -> Self {
        Self { list_devices }
    }
}

impl<L> ConfirmationGate for DialoguerGate<L>
where
    L: Fn() -> Result<Vec<Device>>,
{
    fn prompt(&self, overrides: &Overrides) -> Result<Answers> {
        answer(
            overrides,
            || {
                pick_drive(&self.list_devices, |devices| {
                    select_device(devices, "Select drive")
                })
            },
            |drive| {
                Term::stderr().write_line(&format!(
                    "{} This will erase all data on '{}'.",
                    style("WARNING:").red().bold().for_stderr(),
                    style(drive).cyan().for_stderr(),
                ))?;
                confirm_operation("This will erase the selected drive. Are you sure?")
            },
        )
    }
}

/// Lists the devices and returns the path of the one `choose` picks.
fn pick_drive(
    list_devices: impl Fn() -> Result<Vec<Device>>,
    choose: impl FnOnce(&[Device]) -> Result<usize>,
) -> Result<String> {
    let devices = list_devices()?;
    if devices.is_empty() {
        return Err(anyhow!("No removable devices found."));
    }

    let index = choose(&devices)?;
    let device = devices
        .get(index)
        .ok_or_else(|| anyhow!("No device at position {index}"))?;
    Ok(device.path.display().to_string())
}

/// Fills in whatever `overrides` leaves open using the given prompts.
fn answer(
    overrides: &Overrides,
    pick_drive: impl FnOnce() -> Result<String>,
    confirm: impl FnOnce(&str) -> Result<bool>,
) -> Result<Answers> {
    let drive = match &overrides.drive {
        Some(drive) => drive.clone(),
        None => pick_drive()?,
    };

    let yes = match overrides.yes {
        Some(true) => true,
        _ => confirm(&drive)?,
    };

    Ok(Answers { drive, yes })
}

/// Presents an interactive menu for the user to select a device.
fn select_device(devices: &[Device], prompt: &str) -> Result<usize> {
    let items: Vec<String> = devices.iter().map(|d| d.to_string()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(selection)
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}
