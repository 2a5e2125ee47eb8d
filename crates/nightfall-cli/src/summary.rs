use console::Style;
use nightfall_core::block::BlockDescriptor;
use nightfall_core::pipeline::{RunSummary, SequenceConfig};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_config_summary(config: &SequenceConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(format!("Nightfall: {}", config.name)));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(config.name.len() + 11)));
    println!();

    match &config.input_dir {
        Some(dir) => println!(
            "  {:<14}{}",
            s.label.apply_to("Folder"),
            s.path.apply_to(dir.display())
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Folder"),
            s.disabled.apply_to("none")
        ),
    }
    let inputs = if config.inputs.is_empty() {
        "light frames of folder".to_string()
    } else {
        format!("{} file(s)", config.inputs.len())
    };
    println!("  {:<14}{}", s.label.apply_to("Inputs"), s.value.apply_to(inputs));
    if let Some(ref telescope) = config.telescope {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Telescope"),
            s.value.apply_to(telescope)
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Execution"),
        s.method.apply_to(&config.execution)
    );
    println!();

    print_blocks(&s, "Blocks", &config.blocks);
    print_blocks(&s, "Data blocks", &config.data_blocks);
}

fn print_blocks(s: &Styles, title: &str, blocks: &[BlockDescriptor]) {
    if blocks.is_empty() {
        return;
    }
    println!("  {}", s.header.apply_to(title));
    for (i, descriptor) in blocks.iter().enumerate() {
        let name = descriptor.name.as_deref().unwrap_or("");
        let params: Vec<String> = descriptor
            .args
            .iter()
            .map(|v| v.to_string())
            .chain(descriptor.kwargs.iter().map(|(k, v)| format!("{k}={v}")))
            .collect();
        println!(
            "    {:<3}{:<16}{:<14}{}",
            s.label.apply_to(i),
            s.method.apply_to(&descriptor.block),
            s.value.apply_to(name),
            s.label.apply_to(params.join(", "))
        );
    }
    println!();
}

pub fn print_run_summary(summary: &RunSummary) {
    let s = Styles::new();

    println!();
    print!("{}", summary.timing);
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Processed"),
        s.value.apply_to(format!(
            "{} image(s) in {:.2} s",
            summary.processed,
            summary.processing_time.as_secs_f64()
        ))
    );

    if summary.discards.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Discarded"),
            s.disabled.apply_to("none")
        );
    } else {
        println!("  {}", s.header.apply_to("Discarded"));
        for record in &summary.discards {
            let images: Vec<String> = record.images.iter().map(|i| i.to_string()).collect();
            println!(
                "    {:<16}{:<14}{}",
                s.method.apply_to(&record.kind),
                s.value.apply_to(format!("{} image(s)", record.images.len())),
                s.label.apply_to(images.join(", "))
            );
        }
    }

    if !summary.citations.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Cite"),
            s.value.apply_to(summary.citations.join(", "))
        );
    }
    println!();
}
