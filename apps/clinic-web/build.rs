fn main() {
    // Gera src/built.rs em OUT_DIR com versão e horário de compilação
    built::write_built_file().expect("Falha ao coletar informações de build");
}
