//! Bundle lifecycle commands.

use hotbundle::bundle::BUILTIN_ID;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{describe, display_relative, status_label, GlobalArgs};
use crate::error::CliError;

/// Download and register a bundle.
pub fn download(args: &GlobalArgs, url: &str, version_name: Option<&str>) -> Result<(), CliError> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .map_err(|e| CliError::Config(e.to_string()))?
            .progress_chars("=> "),
    );
    bar.set_message("downloading");

    let progress_bar = bar.clone();
    let manager = args.open_manager(Some(Box::new(move |_: &str, percent: u8| {
        progress_bar.set_position(u64::from(percent));
        let stage = match percent {
            0..=70 => "downloading",
            71..=90 => "extracting",
            _ => "installing",
        };
        progress_bar.set_message(stage);
    })))?;

    let result = manager.download(url, version_name);
    bar.finish_and_clear();
    let info = result?;

    println!(
        "Downloaded bundle {} ({})",
        console::style(&info.id).bold(),
        if info.version_name().is_empty() {
            "no version name"
        } else {
            info.version_name()
        }
    );
    println!("  Checksum: {}", info.checksum);
    println!(
        "  Path:     {}",
        display_relative(&manager.bundle_dir(&info.id), &manager.config().root_dir)
    );
    println!(
        "Run 'hotbundle set {}' to activate it, or 'hotbundle next {}' to stage it.",
        info.id, info.id
    );
    Ok(())
}

/// List installed bundles.
pub fn list(args: &GlobalArgs) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let bundles = manager.list()?;
    let current = manager.current_bundle_id();

    if bundles.is_empty() {
        println!("No bundles installed (using builtin bundle).");
        return Ok(());
    }

    println!(
        "  {:<12} {:<12} {:<12} {:<20} {}",
        "ID", "VERSION", "STATUS", "CREATED", "CHECKSUM"
    );
    for info in &bundles {
        let marker = if info.id == current { "*" } else { " " };
        println!("{} {}", marker, describe(info));
    }
    println!();
    println!("{} bundle(s); * marks the active bundle", bundles.len());
    Ok(())
}

/// Show the pointer state.
pub fn current(args: &GlobalArgs) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let current = manager.current_bundle();

    println!("Active bundle:   {}", current.id);
    println!("  Path:          {}", manager.current_bundle_path());
    println!("  Status:        {}", status_label(current.status));
    if !current.version_name().is_empty() {
        println!("  Version:       {}", current.version_name());
    }
    println!("  Using builtin: {}", manager.is_using_builtin());
    println!("Fallback bundle: {}", manager.fallback_bundle().id);
    match manager.next_bundle() {
        Some(next) => println!("Next bundle:     {}", next.id),
        None => println!("Next bundle:     (none)"),
    }
    Ok(())
}

/// Activate a bundle.
pub fn set(args: &GlobalArgs, id: &str) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    if manager.set(id)? {
        println!("Active bundle is now {}", id);
        Ok(())
    } else {
        Err(CliError::Rejected(format!(
            "Bundle {} is not installed. Use 'hotbundle list' to see installed bundles.",
            id
        )))
    }
}

/// Mark a bundle as working.
pub fn success(args: &GlobalArgs, id: &str, auto_delete: bool) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let auto_delete = auto_delete || manager.config().auto_delete_previous;
    let previous = manager.fallback_bundle();

    manager.set_success(id, auto_delete)?;

    println!("Bundle {} confirmed and set as fallback", id);
    if auto_delete && !previous.is_builtin() && previous.id != id {
        if manager.bundle_dir(&previous.id).exists() {
            println!("  Previous bundle {} was kept", previous.id);
        } else {
            println!("  Removed previous bundle {}", previous.id);
        }
    }
    Ok(())
}

/// Mark a bundle as failing.
pub fn error(args: &GlobalArgs, id: &str) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let info = manager.set_error(id)?;
    println!("Bundle {} marked as {}", info.id, status_label(info.status));
    Ok(())
}

/// Delete a bundle.
pub fn delete(args: &GlobalArgs, id: &str, keep_info: bool) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    if manager.delete(id, !keep_info)? {
        println!("Deleted bundle {}", id);
        Ok(())
    } else {
        Err(CliError::Rejected(format!(
            "Bundle {} was not deleted. The active bundle, the builtin bundle and bundles \
             still downloading cannot be deleted.",
            id
        )))
    }
}

/// Return to the builtin bundle.
pub fn reset(args: &GlobalArgs) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    manager.reset(false)?;
    println!("Reset to the builtin bundle");
    Ok(())
}

/// Show, stage or clear the next bundle.
pub fn next(args: &GlobalArgs, id: Option<&str>, clear: bool) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;

    if clear {
        manager.set_next_bundle(None)?;
        println!("Next bundle cleared");
        return Ok(());
    }

    let Some(id) = id else {
        match manager.next_bundle() {
            Some(next) => println!("{}", describe(&next)),
            None => println!("No bundle staged"),
        }
        return Ok(());
    };

    if manager.set_next_bundle(Some(id))? {
        println!("Bundle {} will be used at next start", id);
        Ok(())
    } else {
        Err(CliError::Rejected(format!("Bundle {} is not installed", id)))
    }
}

/// Show the fallback bundle.
pub fn fallback(args: &GlobalArgs) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let fallback = manager.fallback_bundle();
    if fallback.id == BUILTIN_ID {
        println!("Fallback is the builtin bundle");
    } else {
        println!("{}", describe(&fallback));
    }
    Ok(())
}

/// Change a bundle's version name.
pub fn rename(args: &GlobalArgs, id: &str, name: &str) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    let name = (!name.is_empty()).then_some(name);
    let info = manager.set_version_name(id, name)?;
    println!("{}", describe(&info));
    Ok(())
}
