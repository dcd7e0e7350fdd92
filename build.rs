use std::{env, path::PathBuf, process::Command};

fn main() {
    println!("cargo::rustc-check-cfg=cfg(cuda_backend)");
    println!("cargo:rerun-if-changed=src/cuda");
    println!("cargo:rerun-if-env-changed=DIFFPREP_CUDA");

    let target = env::var("TARGET").unwrap();
    let forced = env::var("DIFFPREP_CUDA").map(|v| v == "1").unwrap_or(false);

    if !forced && !target.contains("aarch64-unknown-linux") {
        println!("cargo:warning=Building without the CUDA backend (set DIFFPREP_CUDA=1 to enable)");
        return;
    }

    println!("cargo:rustc-cfg=cuda_backend");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    //
    // ---- Target architecture ----
    //
    let (arch, code) = if target.contains("aarch64-unknown-linux") {
        // Jetson Orin
        ("compute_87", "sm_87")
    } else {
        ("compute_80", "sm_80")
    };

    //
    // ---- Compile each .cu file into PTX ----
    //
    let kernels = [
        "src/cuda/kernels/maxpool_downsample.cu",
        "src/cuda/kernels/photon_compress.cu",
    ];

    for kernel in kernels {
        let kpath = PathBuf::from(kernel);
        let name = kpath.file_stem().unwrap().to_str().unwrap();
        let ptx_file = out_dir.join(format!("{name}.ptx"));

        println!("cargo:warning=Compiling {kernel} → {name}.ptx");

        let status = Command::new("nvcc")
            .arg("-ptx")
            .arg("-o")
            .arg(&ptx_file)
            .arg(&kpath)
            .arg(format!("-arch={}", arch))
            .arg(format!("-code={}", code))
            .status()
            .expect("Failed to run nvcc");

        assert!(status.success(), "Failed to compile {kernel} to PTX");
    }
}
