use railmeter_core::registered_devices;

pub fn run() {
    let devices = registered_devices();
    println!("Supported device families ({}):\n", devices.len());

    for info in devices {
        println!("  {:<12} {}", info.tag, info.description);
        if !info.aliases.is_empty() {
            println!("  {:<12} aliases: {}", "", info.aliases.join(", "));
        }
        println!("  {:<12} format:  {}", "", info.convention);
        println!("  {:<12} rails:   {}", "", info.rails.join(", "));
        println!();
    }
}
